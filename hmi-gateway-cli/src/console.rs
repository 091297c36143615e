//! Console rendering of display-sink events
//!
//! Stands in for the dashboard: one line per update, alerts rendered
//! prominently. Runs on its own thread and exits when the gateway
//! drops its last publisher.

use crossbeam_channel::Receiver;

use hmi_gateway::{SinkEvent, SignalValue};

/// Consume sink events until the channel closes
pub fn run_console(events: Receiver<SinkEvent>) {
    for event in events {
        render(&event);
    }
    log::debug!("Display sink closed, console renderer exiting");
}

fn render(event: &SinkEvent) {
    match event {
        SinkEvent::Signal { name, value } => {
            println!("  {} = {}", name, format_value(value));
        }
        SinkEvent::DriveMode(text) => {
            println!("  Gear: {}", text);
        }
        SinkEvent::Alarm { active: true, message } => {
            println!("\n!!! ALERT !!!");
            println!("{}\n", message);
        }
        SinkEvent::Alarm { active: false, .. } => {
            println!("\n--- alert cleared ---\n");
        }
        SinkEvent::BusState { connected } => {
            if *connected {
                println!("  [bus] connected");
            } else {
                println!("  [bus] connection lost, retrying");
            }
        }
    }
}

fn format_value(value: &SignalValue) -> String {
    match value {
        SignalValue::Float(v) => format!("{:.2}", v),
        other => other.to_string(),
    }
}
