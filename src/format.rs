use crate::allocation::{AllocatedResources, PodAllocatedResources};
use crate::model::Dimension;
use crate::quantity::{format_fraction, parse_magnitude};
use crossterm::style::Stylize;

pub const WARNING_THRESHOLD: f64 = 90.00;
pub const CRITICAL_THRESHOLD: f64 = 95.00;

pub type Row = Vec<String>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub warning: f64,
    pub critical: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning: WARNING_THRESHOLD,
            critical: CRITICAL_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Normal,
    Warning,
    Critical,
}

impl Severity {
    pub fn classify(display: &str, thresholds: &Thresholds) -> Self {
        let magnitude = parse_magnitude(display);
        if magnitude > thresholds.critical {
            Self::Critical
        } else if magnitude > thresholds.warning {
            Self::Warning
        } else {
            Self::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowStyle {
    pub thresholds: Thresholds,
    pub color: bool,
}

impl RowStyle {
    pub fn plain() -> Self {
        Self {
            thresholds: Thresholds::default(),
            color: false,
        }
    }

    pub fn colored() -> Self {
        Self {
            thresholds: Thresholds::default(),
            color: true,
        }
    }

    fn highlight(&self, display: String) -> String {
        if !self.color {
            return display;
        }
        match Severity::classify(&display, &self.thresholds) {
            Severity::Critical => display.red().to_string(),
            Severity::Warning => display.yellow().to_string(),
            Severity::Normal => display,
        }
    }

    fn highlighted_fraction(&self, fraction: f64) -> String {
        self.highlight(format_fraction(fraction))
    }
}

pub fn node_fields(allocated: &AllocatedResources, dimension: Dimension, style: &RowStyle) -> Row {
    match dimension {
        Dimension::Cpu => {
            let cpu = &allocated.cpu;
            vec![
                cpu.usage.to_string(),
                cpu.requests.to_string(),
                style.highlighted_fraction(cpu.requests_fraction),
                cpu.limits.to_string(),
                format_fraction(cpu.limits_fraction),
                cpu.capacity.to_string(),
            ]
        }
        Dimension::Memory => {
            let memory = &allocated.memory;
            vec![
                memory.usage.to_string(),
                memory.requests.to_string(),
                style.highlighted_fraction(memory.requests_fraction),
                memory.limits.to_string(),
                format_fraction(memory.limits_fraction),
                memory.capacity.to_string(),
            ]
        }
        Dimension::Gpu => {
            let gpu = &allocated.gpu;
            vec![
                gpu.requests.to_string(),
                style.highlighted_fraction(gpu.requests_fraction),
                gpu.limits.to_string(),
                format_fraction(gpu.limits_fraction),
            ]
        }
        Dimension::Pod => {
            let pods = &allocated.pods;
            vec![
                format!("{}/{}", pods.allocated, pods.capacity),
                style.highlighted_fraction(pods.fraction),
            ]
        }
        Dimension::All => Dimension::NODE
            .iter()
            .flat_map(|dimension| node_fields(allocated, *dimension, style))
            .collect(),
    }
}

pub fn node_row(node_name: &str, blocks: &[(Dimension, AllocatedResources)], style: &RowStyle) -> Row {
    std::iter::once(node_name.to_string())
        .chain(
            blocks
                .iter()
                .flat_map(|(dimension, allocated)| node_fields(allocated, *dimension, style)),
        )
        .collect()
}

pub fn pod_row(
    namespace: &str,
    pod_name: &str,
    blocks: &[(Dimension, PodAllocatedResources)],
    style: &RowStyle,
) -> Row {
    [namespace.to_string(), pod_name.to_string()]
        .into_iter()
        .chain(
            blocks
                .iter()
                .flat_map(|(dimension, allocated)| pod_fields(allocated, *dimension, style)),
        )
        .collect()
}

pub fn pod_fields(allocated: &PodAllocatedResources, dimension: Dimension, style: &RowStyle) -> Row {
    match dimension {
        Dimension::Cpu => {
            let cpu = &allocated.cpu;
            vec![
                cpu.usage.to_string(),
                style.highlighted_fraction(cpu.usage_fraction),
                cpu.requests.to_string(),
                cpu.limits.to_string(),
            ]
        }
        Dimension::Memory => {
            let memory = &allocated.memory;
            vec![
                memory.usage.to_string(),
                style.highlighted_fraction(memory.usage_fraction),
                memory.requests.to_string(),
                memory.limits.to_string(),
            ]
        }
        Dimension::Gpu => vec![
            allocated.gpu.requests.to_string(),
            allocated.gpu.limits.to_string(),
        ],
        // pod counts are a node-only dimension
        Dimension::Pod => Vec::new(),
        Dimension::All => Dimension::POD
            .iter()
            .flat_map(|dimension| pod_fields(allocated, *dimension, style))
            .collect(),
    }
}
