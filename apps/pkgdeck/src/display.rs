//! Human-readable rendering helpers

use console::style;

use pkgdeck_resources::Resource;
use pkgdeck_types::ResourceState;

/// One catalog row: state marker, name, versions, size.
pub fn resource_line(resource: &Resource) -> String {
    let marker = match resource.state() {
        ResourceState::Installed => style("✓").green().to_string(),
        ResourceState::Upgradeable => style("↑").yellow().to_string(),
        ResourceState::Broken => style("✗").red().to_string(),
        _ => " ".to_owned(),
    };
    let versions = match (resource.installed_version(), resource.available_version()) {
        (Some(installed), Some(available)) if installed != available => {
            format!("{installed} -> {available}")
        }
        (Some(installed), _) => installed,
        (None, Some(available)) => available,
        (None, None) => String::new(),
    };
    format!(
        "{marker} {:<24} {:<18} {:>9}  {}",
        style(resource.display_name()).bold(),
        versions,
        format_size(resource.size()),
        resource.comment()
    )
}

/// Format a byte count with binary units.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if bytes == 0 {
        return "-".to_owned();
    }
    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Format a bytes-per-second rate.
pub fn format_speed(bytes_per_second: u64) -> String {
    format!("{}/s", format_size(bytes_per_second))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(format_size(0), "-");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KiB");
        assert_eq!(format_size(186_000_000), "177.4 MiB");
    }

    #[test]
    fn speed_has_rate_suffix() {
        assert_eq!(format_speed(2048), "2.0 KiB/s");
    }
}
