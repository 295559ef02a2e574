use forecast_core::{ForecastResult, Period, ResolutionState};

/// Print whatever the state has to show. Loading and idle print nothing.
pub fn print_state(state: &ResolutionState) {
    match state {
        ResolutionState::Success { result, .. } => print_forecast(result),
        ResolutionState::Error { error, query } => {
            tracing::debug!(%query, "{error}");
            eprintln!("Error fetching weather data: {}", error.user_message());
        }
        ResolutionState::Idle | ResolutionState::Loading(_) => {}
    }
}

pub fn print_forecast(result: &ForecastResult) {
    println!("Weather forecast for {}", result.canonical_address);

    for (index, pair) in result.grouped_periods().iter().enumerate() {
        println!();
        if index == 0 {
            println!("  Today");
        }
        println!("{}", format_period(pair.day));
        println!("{}", format_period(pair.night));
    }
}

pub fn format_period(period: &Period) -> String {
    let wind = match (&period.wind_speed, &period.wind_direction) {
        (Some(speed), Some(direction)) => format!("{speed} {direction}"),
        (Some(speed), None) => speed.clone(),
        (None, Some(direction)) => direction.clone(),
        (None, None) => "-".to_string(),
    };

    format!(
        "  {:<16} {:>6}  {:>4}°{}  {:<28}  precip {:>3}%  wind {}",
        period.name,
        period.start_time.format("%b %-d").to_string(),
        period.temperature.round(),
        period.temperature_unit,
        period.short_forecast,
        period.precipitation_chance().round(),
        wind,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use forecast_core::model::QuantitativeValue;

    fn period() -> Period {
        Period {
            number: 1,
            name: "Tonight".to_string(),
            start_time: DateTime::parse_from_rfc3339("2025-06-03T18:00:00-04:00").unwrap(),
            end_time: DateTime::parse_from_rfc3339("2025-06-04T06:00:00-04:00").unwrap(),
            is_daytime: false,
            temperature: 61.0,
            temperature_unit: "F".to_string(),
            temperature_trend: None,
            probability_of_precipitation: Some(QuantitativeValue {
                unit_code: "wmoUnit:percent".to_string(),
                value: Some(40.0),
            }),
            wind_speed: Some("5 mph".to_string()),
            wind_direction: Some("SW".to_string()),
            icon: String::new(),
            short_forecast: "Chance Showers".to_string(),
            detailed_forecast: String::new(),
        }
    }

    #[test]
    fn period_line_has_date_temperature_and_wind() {
        let line = format_period(&period());
        assert!(line.contains("Tonight"));
        assert!(line.contains("Jun 3"));
        assert!(line.contains("61°F"));
        assert!(line.contains("precip  40%"));
        assert!(line.contains("wind 5 mph SW"));
    }

    #[test]
    fn missing_precipitation_reads_as_zero() {
        let mut p = period();
        p.probability_of_precipitation = None;
        p.wind_direction = None;
        let line = format_period(&p);
        assert!(line.contains("precip   0%"));
        assert!(line.ends_with("wind 5 mph"));
    }
}
