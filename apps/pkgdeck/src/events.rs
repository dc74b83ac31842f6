//! Event handling and progress display

use console::style;
use tracing::Level;

use pkgdeck_events::{
    AppEvent, EventMessage, EventMeta, GeneralEvent, ResourceEvent, SearchEvent,
    TransactionEvent, UpdateEvent,
};
use pkgdeck_types::TransactionStatus;

use crate::display::format_speed;

/// Mirror a bus message into the tracing subscriber at its stamped level.
/// The tracing macros need a const level, hence the dispatch.
fn trace_event(meta: &EventMeta, event: &AppEvent) {
    let source = meta.source.as_str();
    let level = meta.tracing_level();
    if level == Level::ERROR {
        tracing::error!(source, id = %meta.event_id, ?event);
    } else if level == Level::WARN {
        tracing::warn!(source, id = %meta.event_id, ?event);
    } else if level == Level::INFO {
        tracing::info!(source, id = %meta.event_id, ?event);
    } else if level == Level::DEBUG {
        tracing::debug!(source, id = %meta.event_id, ?event);
    } else {
        tracing::trace!(source, id = %meta.event_id, ?event);
    }
}

/// Renders the core's event stream as terminal feedback.
pub struct EventHandler {
    debug: bool,
    /// Last printed whole-percent aggregate, to avoid repainting every
    /// fractional change.
    last_update_percent: Option<u64>,
}

impl EventHandler {
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            last_update_percent: None,
        }
    }

    pub fn handle_event(&mut self, message: EventMessage) {
        trace_event(&message.meta, &message.event);
        match message.event {
            AppEvent::General(event) => self.handle_general(event),
            AppEvent::Transaction(event) => self.handle_transaction(event),
            AppEvent::Update(event) => self.handle_update(event),
            AppEvent::Search(event) => self.handle_search(&event),
            AppEvent::Resource(event) => self.handle_resource(&event),
        }
    }

    fn handle_general(&self, event: GeneralEvent) {
        match event {
            GeneralEvent::Warning { message, .. } => {
                println!("{} {message}", style("warning:").yellow().bold());
            }
            GeneralEvent::Error { message, .. } => {
                println!("{} {message}", style("error:").red().bold());
            }
            GeneralEvent::PassiveMessage { message } => {
                println!("{} {message}", style("note:").cyan());
            }
            GeneralEvent::DebugLog { message, .. } => {
                if self.debug {
                    println!("{} {message}", style("debug:").dim());
                }
            }
            GeneralEvent::OperationStarted { operation } => {
                if self.debug {
                    println!("{} {operation}", style("started:").dim());
                }
            }
            GeneralEvent::OperationCompleted { operation, success } => {
                if self.debug {
                    let outcome = if success { "ok" } else { "failed" };
                    println!("{} {operation}: {outcome}", style("finished:").dim());
                }
            }
        }
    }

    fn handle_transaction(&self, event: TransactionEvent) {
        match event {
            TransactionEvent::StatusChanged {
                resource,
                role,
                new,
                ..
            } => {
                println!("  {} {}", style(new.text(role)).bold(), resource.name);
            }
            TransactionEvent::Failed {
                resource, failure, ..
            } => {
                println!(
                    "{} {}: {}",
                    style("failed:").red().bold(),
                    resource.name,
                    failure.message
                );
                if let Some(hint) = failure.hint {
                    println!("  {hint}");
                }
            }
            TransactionEvent::Removed { resource, status } => {
                if status == TransactionStatus::Cancelled {
                    println!("{} {}", style("cancelled:").yellow(), resource.name);
                }
            }
            TransactionEvent::DownloadSpeedChanged {
                resource,
                bytes_per_second,
            } => {
                if self.debug {
                    println!(
                        "  {} {} {}",
                        style("speed:").dim(),
                        resource.name,
                        format_speed(bytes_per_second)
                    );
                }
            }
            // Added/FirstStarted/AllFinished/Progress drive GUI affordances;
            // the one-shot CLI has nothing to toggle.
            _ => {}
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn handle_update(&mut self, event: UpdateEvent) {
        match event {
            UpdateEvent::BatchStarted { targets, .. } => {
                println!("Upgrading {targets} package(s)");
                self.last_update_percent = None;
            }
            UpdateEvent::ProgressChanged {
                progress,
                download_speed,
                eta_seconds,
                ..
            } => {
                let percent = progress.clamp(0.0, 100.0) as u64;
                if self.last_update_percent == Some(percent) {
                    return;
                }
                self.last_update_percent = Some(percent);
                let mut line = format!("  {percent:>3}%");
                if download_speed > 0 {
                    line.push_str(&format!("  {}", format_speed(download_speed)));
                }
                if let Some(eta) = eta_seconds {
                    line.push_str(&format!("  ~{eta}s left"));
                }
                println!("{line}");
            }
            UpdateEvent::CheckStarted { backend } => {
                if self.debug {
                    println!("{} checking {backend} for updates", style("debug:").dim());
                }
            }
            UpdateEvent::CheckFinished { backend, updates } => {
                if self.debug {
                    println!(
                        "{} {backend} reports {updates} update(s)",
                        style("debug:").dim()
                    );
                }
            }
            UpdateEvent::CancelRequested { backend } => {
                println!("{} cancelling {backend} upgrades", style("note:").cyan());
            }
            UpdateEvent::ProgressingChanged { .. }
            | UpdateEvent::ResourceProgressed { .. }
            | UpdateEvent::CancellableChanged { .. } => {}
        }
    }

    fn handle_search(&self, event: &SearchEvent) {
        if let SearchEvent::StreamSlow { name, elapsed_ms } = event {
            println!(
                "{} stream {name} is slow ({elapsed_ms}ms)",
                style("warning:").yellow()
            );
        }
    }

    fn handle_resource(&self, event: &ResourceEvent) {
        if !self.debug {
            return;
        }
        if let ResourceEvent::StateChanged {
            resource, old, new, ..
        } = event
        {
            println!(
                "{} {} state {old:?} -> {new:?}",
                style("debug:").dim(),
                resource.name
            );
        }
    }
}
