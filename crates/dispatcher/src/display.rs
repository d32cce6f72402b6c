//! Plain-text rendering of status reports and job progress for the CLI.
//!
//! Everything here is a pure function of its input; the binary decides
//! where the text goes.

use vidfactory_comfyui::job::{JobHandle, JobOutputs};
use vidfactory_comfyui::poller::PollEvent;
use vidfactory_core::hardware::{DeviceRole, DeviceStatus};

use crate::aggregator::StatusReport;
use crate::health::ServiceStatus;

const WIDTH: usize = 70;

fn rule(c: char) -> String {
    std::iter::repeat(c).take(WIDTH).collect()
}

pub fn render_report(report: &StatusReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\nVIDEO FACTORY STATUS\n{}\n", rule('='), rule('=')));
    out.push_str(&format!(
        "  generated {}\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    out.push_str(&format!("\nGPU STATUS:\n{}\n", rule('-')));
    match &report.telemetry_error {
        Some(error) => out.push_str(&format!("  WARNING: Could not get GPU status: {error}\n")),
        None if report.devices.is_empty() => out.push_str("  No GPUs reported\n"),
        None => {
            for device in &report.devices {
                out.push_str(&device_line(device, report.role(device.index)));
                out.push('\n');
            }
        }
    }

    out.push_str(&format!("\nSERVICES:\n{}\n", rule('-')));
    for (name, status) in &report.services {
        out.push_str(&format!("  {:<11} {}\n", format!("{name}:"), service_summary(status)));
    }

    out.push_str(&format!("\n{}\n", rule('=')));
    out
}

fn device_line(device: &DeviceStatus, role: Option<&DeviceRole>) -> String {
    let name: String = device.name.chars().take(25).collect();
    let state = if device.busy { "[BUSY]" } else { "[READY]" };
    let mut line = format!(
        "  GPU {}: {:<25} {:<8} VRAM: {:>3}% ({:>5}/{}MB) util {:>3}%",
        device.index,
        name,
        state,
        device.memory_percent(),
        device.memory_used_mb,
        device.memory_total_mb,
        device.utilization_percent,
    );
    if let Some(role) = role {
        line.push_str(&format!(" [{}]", role.role));
        if let Some(service) = &role.service {
            line.push_str(&format!(" <{service}>"));
        }
    }
    line
}

fn service_summary(status: &ServiceStatus) -> String {
    if !status.reachable {
        let reason = status.error.as_deref().unwrap_or("Unknown error");
        return format!("OFFLINE - {reason}");
    }

    let mut summary = String::from("ONLINE");
    if let Some(version) = &status.version {
        summary.push_str(&format!(" (v{version})"));
    }
    if let (Some(running), Some(pending)) = (status.queue_running, status.queue_pending) {
        summary.push_str(&format!(" - Queue: {running} running, {pending} pending"));
    }
    if let Some(mb) = status.vram_free_mb {
        summary.push_str(&format!(" - VRAM free: {}", gigabytes(mb)));
    }
    summary
}

fn gigabytes(mb: u64) -> String {
    format!("{:.2}GB", mb as f64 / 1024.0)
}

/// Detailed connectivity check output for the engine.
pub fn render_engine_check(status: &ServiceStatus) -> String {
    if !status.reachable {
        return format!(
            "FAIL: ComfyUI is offline: {}\n",
            status.error.as_deref().unwrap_or("Unknown error")
        );
    }

    let unknown = || "unknown".to_string();
    let mut out = String::from("OK: ComfyUI is online\n");
    out.push_str(&format!(
        "   Version: {}\n",
        status.version.clone().unwrap_or_else(unknown)
    ));
    out.push_str(&format!(
        "   GPU: {}\n",
        status.device_name.clone().unwrap_or_else(unknown)
    ));
    out.push_str(&format!(
        "   VRAM Free: {}\n",
        status.vram_free_mb.map(gigabytes).unwrap_or_else(unknown)
    ));
    if let (Some(running), Some(pending)) = (status.queue_running, status.queue_pending) {
        out.push_str(&format!("   Queue: {running} running, {pending} pending\n"));
    }
    out
}

/// First eight characters of a handle.
pub fn short_handle(handle: &JobHandle) -> String {
    handle.as_str().chars().take(8).collect()
}

pub fn queued_line(handle: &JobHandle) -> String {
    format!("  Queued: {}...", short_handle(handle))
}

/// Inline progress mark for one poll event: a dot per wait, then the
/// outcome.
pub fn progress_mark(event: &PollEvent) -> String {
    match event {
        PollEvent::Waiting { .. } => ".".to_string(),
        PollEvent::Succeeded { elapsed, .. } => format!(" Done ({}s)", elapsed.as_secs()),
        PollEvent::Failed { elapsed, .. } => format!(" Failed ({}s)", elapsed.as_secs()),
        PollEvent::TimedOut { elapsed, .. } => format!(" Timed out ({}s)", elapsed.as_secs()),
    }
}

/// One line per produced file.
pub fn render_outputs(outputs: &JobOutputs) -> String {
    let artifacts = outputs.artifacts();
    if artifacts.is_empty() {
        return "  (no files reported)\n".to_string();
    }
    artifacts
        .iter()
        .map(|a| format!("  node {}: {}\n", a.node_id, a.relative_path()))
        .collect()
}
