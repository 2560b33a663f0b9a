//! A renderer that describes each new page through tracing.

use wxstar_display::{Frame, Mode, RenderError, Renderer};
use chrono::Utc;
use wxstar_weather::{Moon, TrendMetric, WeatherModel};

#[derive(Debug, Default)]
pub struct LogRenderer {
    last_page: Option<&'static str>,
    last_mode: Option<Mode>,
    loading_reported: bool,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for LogRenderer {
    fn render(&mut self, frame: &Frame<'_>) -> Result<(), RenderError> {
        if self.last_mode != Some(frame.mode) {
            tracing::info!(mode = ?frame.mode, "Display mode");
            self.last_mode = Some(frame.mode);
        }

        let Some(page) = frame.page else {
            if !self.loading_reported {
                tracing::info!("Waiting for weather data");
                self.loading_reported = true;
            }
            self.last_page = None;
            return Ok(());
        };
        self.loading_reported = false;

        if self.last_page == Some(page.id) {
            return Ok(());
        }
        self.last_page = Some(page.id);

        let summary = frame
            .entry
            .map(|entry| summarize(page.id, &entry.model, frame))
            .unwrap_or_default();
        tracing::info!(
            page = page.id,
            theme = frame.settings.theme.as_str(),
            "{}: {}",
            page.title,
            summary
        );
        Ok(())
    }
}

fn summarize(page_id: &str, model: &WeatherModel, frame: &Frame<'_>) -> String {
    let current = &model.current;
    match page_id {
        "current-conditions" => {
            let arrow = frame
                .trends
                .and_then(|t| t.direction(TrendMetric::Temperature))
                .map(|d| d.arrow().to_string())
                .unwrap_or_default();
            format!(
                "{:.1}°C{} {} at {}",
                current.temperature,
                arrow,
                current.description,
                model.location_label.as_deref().unwrap_or("station")
            )
        }
        "hourly-forecast" | "temperature-graph" => format!("{} hourly points", model.hourly.len()),
        "extended-forecast" | "local-forecast" => format!("{} days", model.daily.len()),
        "weekend-forecast" => {
            let days: Vec<String> = model
                .weekend_days()
                .map(|d| {
                    let high = d.high.map(|h| format!(" {:.0}°C", h)).unwrap_or_default();
                    format!("{}{} {}", d.date.format("%A"), high, d.condition.description())
                })
                .collect();
            if days.is_empty() {
                "weekend forecast not available".to_string()
            } else {
                days.join(", ")
            }
        }
        "sun-moon" => {
            let moon = Moon::at(Utc::now());
            let sun = model
                .daily
                .iter()
                .find_map(|d| d.sunrise.zip(d.sunset))
                .map(|(rise, set)| {
                    format!("sunrise {} sunset {}", rise.format("%H:%M"), set.format("%H:%M"))
                })
                .unwrap_or_default();
            format!(
                "{}, {} ({:.0}% lit)",
                sun,
                moon.phase.label(),
                moon.illumination * 100.0
            )
        }
        "regional-observations" => format!("{} nearby stations", model.regional.len()),
        "hazards" => model
            .alerts
            .first()
            .map(|a| a.headline.clone())
            .unwrap_or_default(),
        "air-quality" => model
            .air_quality
            .as_ref()
            .map(|aq| format!("AQI {} ({})", aq.us_aqi, aq.category.label()))
            .unwrap_or_default(),
        "wind-pressure" => format!(
            "{} hPa, wind {}",
            current.pressure.map(|p| format!("{:.1}", p)).unwrap_or_default(),
            current.wind_compass().unwrap_or("calm")
        ),
        _ => String::new(),
    }
}
