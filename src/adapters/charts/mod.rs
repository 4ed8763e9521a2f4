mod plotters;

pub use self::plotters::PlottersRenderer;
