mod client;

pub use client::OpenMeteoClient;
