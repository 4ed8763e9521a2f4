/// Human description of a WMO weather interpretation code
pub fn describe(code: Option<f64>) -> String {
    let Some(code) = code else {
        return "—".to_string();
    };
    let code = code as i64;

    let text = match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        71 => "Slight snowfall",
        73 => "Moderate snowfall",
        75 => "Heavy snowfall",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        95 => "Thunderstorm",
        99 => "Thunderstorm with hail",
        other => return format!("Code {}", other),
    };
    text.to_string()
}
