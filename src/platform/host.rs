//! Linux host probes.
//!
//! The host bridge samples the machine it runs on (network interfaces,
//! backlight level, locale environment) and mirrors any change into a
//! [`VirtualDevice`], so the state channels report real values when the
//! binary runs on a laptop or a single-board computer.

use super::{DeviceProbe, VirtualDevice};
use crate::channels::data::{ActiveNetwork, LocaleInfo};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::Networks;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::debug;

const BACKLIGHT_ROOT: &str = "/sys/class/backlight";

const RTL_LANGUAGES: [&str; 9] = ["ar", "he", "fa", "ur", "yi", "ps", "sd", "ug", "dv"];

/// Parse a POSIX locale value such as `en_US.UTF-8` or `ar_SA@calendar`.
///
/// Returns `None` for the `C`/`POSIX` locales and empty values.
pub fn parse_locale(value: &str) -> Option<LocaleInfo> {
    let base = value
        .split(['.', '@'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "C" || base == "POSIX" {
        return None;
    }

    let (language, country) = match base.split_once(['_', '-']) {
        Some((language, country)) => (language, country),
        None => (base, ""),
    };
    let language_code = language.to_ascii_lowercase();
    let country_code = country.to_ascii_uppercase();
    if language_code.is_empty() || !language_code.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let tag = if country_code.is_empty() {
        language_code.clone()
    } else {
        format!("{}_{}", language_code, country_code)
    };
    let language_name = language_name(&language_code).unwrap_or(language_code.as_str());
    let display_name = match country_name(&country_code) {
        Some(country) => format!("{} ({})", language_name, country),
        None if !country_code.is_empty() => format!("{} ({})", language_name, country_code),
        None => language_name.to_string(),
    };
    let is_rtl = RTL_LANGUAGES.contains(&language_code.as_str());

    Some(LocaleInfo {
        language_code,
        country_code,
        tag,
        display_name,
        is_rtl,
    })
}

fn language_name(code: &str) -> Option<&'static str> {
    Some(match code {
        "en" => "English",
        "ar" => "Arabic",
        "he" => "Hebrew",
        "fa" => "Persian",
        "ur" => "Urdu",
        "fr" => "French",
        "de" => "German",
        "es" => "Spanish",
        "it" => "Italian",
        "pt" => "Portuguese",
        "ja" => "Japanese",
        "zh" => "Chinese",
        "ko" => "Korean",
        "ru" => "Russian",
        _ => return None,
    })
}

fn country_name(code: &str) -> Option<&'static str> {
    Some(match code {
        "US" => "United States",
        "GB" => "United Kingdom",
        "SA" => "Saudi Arabia",
        "EG" => "Egypt",
        "IL" => "Israel",
        "IR" => "Iran",
        "FR" => "France",
        "DE" => "Germany",
        "ES" => "Spain",
        "IT" => "Italy",
        "BR" => "Brazil",
        "JP" => "Japan",
        "CN" => "China",
        "KR" => "South Korea",
        _ => return None,
    })
}

/// Locale from the usual environment variables, in POSIX precedence order.
pub fn locale_from_env() -> Option<LocaleInfo> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.is_empty())
        .and_then(|value| parse_locale(&value))
}

/// Guess the transport of a network interface from its name.
pub fn classify_interface(name: &str) -> Option<ActiveNetwork> {
    if name == "lo" || name.starts_with("docker") || name.starts_with("veth") || name.starts_with("br-")
    {
        return None;
    }
    if name.starts_with("wl") || name.starts_with("wifi") {
        Some(ActiveNetwork::Wifi)
    } else if name.starts_with("ww") || name.starts_with("rmnet") || name.starts_with("usb") {
        Some(ActiveNetwork::Cellular)
    } else if name.starts_with("en") || name.starts_with("eth") {
        Some(ActiveNetwork::Ethernet)
    } else {
        None
    }
}

/// Pick the active transport from `(interface, has_traffic)` pairs.
///
/// Wi-Fi wins over cellular, cellular over ethernet, matching how phones
/// report the default route.
pub fn select_network<'a>(interfaces: impl IntoIterator<Item = (&'a str, bool)>) -> ActiveNetwork {
    let mut best: Option<ActiveNetwork> = None;
    for (name, has_traffic) in interfaces {
        if !has_traffic {
            continue;
        }
        let Some(kind) = classify_interface(name) else {
            continue;
        };
        best = Some(match (best, kind) {
            (Some(ActiveNetwork::Wifi), _) | (_, ActiveNetwork::Wifi) => ActiveNetwork::Wifi,
            (Some(ActiveNetwork::Cellular), _) | (_, ActiveNetwork::Cellular) => {
                ActiveNetwork::Cellular
            }
            _ => ActiveNetwork::Ethernet,
        });
    }
    best.unwrap_or(ActiveNetwork::None)
}

/// Read the first backlight under `root` as a `0.0..=1.0` level.
pub fn read_backlight(root: &Path) -> Option<f32> {
    let mut entries: Vec<_> = fs::read_dir(root).ok()?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    entries.iter().find_map(|entry| {
        let dir = entry.path();
        let current = read_number(&dir.join("brightness"))?;
        let max = read_number(&dir.join("max_brightness"))?;
        if max <= 0.0 {
            return None;
        }
        Some((current / max).clamp(0.0, 1.0))
    })
}

fn read_number(path: &Path) -> Option<f32> {
    fs::read_to_string(path).ok()?.trim().parse::<f32>().ok()
}

/// Mirrors host state into a virtual device on a fixed period.
pub struct HostBridge {
    device: Arc<VirtualDevice>,
    networks: Networks,
}

impl HostBridge {
    pub fn new(device: Arc<VirtualDevice>) -> Self {
        Self {
            device,
            networks: Networks::new_with_refreshed_list(),
        }
    }

    /// Sample the host once and push any changes into the device.
    pub fn sync(&mut self) {
        self.networks.refresh();
        let network = select_network(self.networks.iter().map(|(name, data)| {
            (
                name.as_str(),
                data.total_received() > 0 || data.total_transmitted() > 0,
            )
        }));
        self.device.set_network(network);

        if let Some(level) = read_backlight(Path::new(BACKLIGHT_ROOT)) {
            self.device.set_brightness(level);
        }

        if let Some(locale) = locale_from_env() {
            if self.device.locale().as_ref() != Some(&locale) {
                debug!("Host locale changed to {}", locale.tag);
                self.device.set_locale(locale);
            }
        }
    }

    /// Keep syncing until the returned task is aborted.
    pub fn spawn(mut self, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = time::interval(period);
            loop {
                interval.tick().await;
                self.sync();
            }
        })
    }
}
