use crate::error::ViewError;
use crate::model::{Dimension, NodeUsage, PodUsage, Usage};
use crate::quantity::{CountQuantity, CpuQuantity, MemoryQuantity, calc_percentage};
use crate::resources::{
    CPU, MEMORY, NVIDIA_GPU, PODS, ResourceList, quantity_of, sum_pods, sum_requests_and_limits,
    to_resource_list,
};
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::ResourceExt;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuAllocation {
    pub usage: CpuQuantity,
    pub requests: CpuQuantity,
    pub requests_fraction: f64,
    pub limits: CpuQuantity,
    pub limits_fraction: f64,
    pub capacity: CpuQuantity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemoryAllocation {
    pub usage: MemoryQuantity,
    pub requests: MemoryQuantity,
    pub requests_fraction: f64,
    pub limits: MemoryQuantity,
    pub limits_fraction: f64,
    pub capacity: MemoryQuantity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpuAllocation {
    pub requests: CountQuantity,
    pub requests_fraction: f64,
    pub limits: CountQuantity,
    pub limits_fraction: f64,
    pub capacity: CountQuantity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PodCountAllocation {
    pub allocated: CountQuantity,
    pub capacity: CountQuantity,
    pub fraction: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AllocatedResources {
    pub cpu: CpuAllocation,
    pub memory: MemoryAllocation,
    pub gpu: GpuAllocation,
    pub pods: PodCountAllocation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PodCpuAllocation {
    pub usage: CpuQuantity,
    pub usage_fraction: f64,
    pub requests: CpuQuantity,
    pub limits: CpuQuantity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PodMemoryAllocation {
    pub usage: MemoryQuantity,
    pub usage_fraction: f64,
    pub requests: MemoryQuantity,
    pub limits: MemoryQuantity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PodGpuAllocation {
    pub requests: CountQuantity,
    pub limits: CountQuantity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PodAllocatedResources {
    pub cpu: PodCpuAllocation,
    pub memory: PodMemoryAllocation,
    pub gpu: PodGpuAllocation,
}

pub type NodeMetricsIndex = HashMap<String, Usage>;

pub fn index_node_metrics(metrics: &[NodeUsage]) -> NodeMetricsIndex {
    metrics
        .iter()
        .map(|metric| (metric.name.clone(), metric.usage))
        .collect()
}

pub fn node_capacity(node: &Node) -> ResourceList {
    let status = node.status.as_ref();
    let allocatable = status.and_then(|status| status.allocatable.as_ref());
    match allocatable {
        Some(allocatable) if !allocatable.is_empty() => to_resource_list(Some(allocatable)),
        _ => to_resource_list(status.and_then(|status| status.capacity.as_ref())),
    }
}

pub fn is_active_on(pod: &Pod, node_name: &str) -> bool {
    let scheduled_here = pod
        .spec
        .as_ref()
        .and_then(|spec| spec.node_name.as_deref())
        == Some(node_name);
    let phase = pod
        .status
        .as_ref()
        .and_then(|status| status.phase.as_deref());
    scheduled_here && !matches!(phase, Some("Succeeded" | "Failed"))
}

#[derive(Debug, Clone)]
pub struct NodeLoad {
    usage: Usage,
    requests: ResourceList,
    limits: ResourceList,
    capacity: ResourceList,
    active: usize,
}

impl NodeLoad {
    pub fn new(node: &Node, active_pods: &[Pod], node_metrics: &NodeMetricsIndex) -> Self {
        let (requests, limits) = sum_pods(active_pods);
        Self {
            usage: node_metrics
                .get(&node.name_any())
                .copied()
                .unwrap_or_default(),
            requests,
            limits,
            capacity: node_capacity(node),
            active: active_pods.len(),
        }
    }

    pub fn allocation(&self, dimension: Dimension) -> AllocatedResources {
        let mut allocated = AllocatedResources::default();
        match dimension {
            Dimension::Cpu => allocated.cpu = self.cpu(),
            Dimension::Memory => allocated.memory = self.memory(),
            Dimension::Gpu => allocated.gpu = self.gpu(),
            Dimension::Pod => allocated.pods = self.pods(),
            Dimension::All => {
                allocated.cpu = self.cpu();
                allocated.memory = self.memory();
                allocated.gpu = self.gpu();
                allocated.pods = self.pods();
            }
        }
        allocated
    }

    fn cpu(&self) -> CpuAllocation {
        node_cpu(self.usage, &self.requests, &self.limits, &self.capacity)
    }

    fn memory(&self) -> MemoryAllocation {
        node_memory(self.usage, &self.requests, &self.limits, &self.capacity)
    }

    fn gpu(&self) -> GpuAllocation {
        node_gpu(&self.requests, &self.limits, &self.capacity)
    }

    fn pods(&self) -> PodCountAllocation {
        node_pods(self.active, &self.capacity)
    }
}

pub fn compute_node_allocation(
    node: &Node,
    active_pods: &[Pod],
    node_metrics: &NodeMetricsIndex,
    dimension: Dimension,
) -> AllocatedResources {
    NodeLoad::new(node, active_pods, node_metrics).allocation(dimension)
}

fn node_cpu(
    usage: Usage,
    requests: &ResourceList,
    limits: &ResourceList,
    capacity: &ResourceList,
) -> CpuAllocation {
    let requests = CpuQuantity::from_quantity(quantity_of(requests, CPU));
    let limits = CpuQuantity::from_quantity(quantity_of(limits, CPU));
    let capacity = CpuQuantity::from_quantity(quantity_of(capacity, CPU));
    CpuAllocation {
        usage: usage.cpu,
        requests,
        requests_fraction: requests.percentage_of(capacity),
        limits,
        limits_fraction: limits.percentage_of(capacity),
        capacity,
    }
}

fn node_memory(
    usage: Usage,
    requests: &ResourceList,
    limits: &ResourceList,
    capacity: &ResourceList,
) -> MemoryAllocation {
    let requests = MemoryQuantity::from_quantity(quantity_of(requests, MEMORY));
    let limits = MemoryQuantity::from_quantity(quantity_of(limits, MEMORY));
    let capacity = MemoryQuantity::from_quantity(quantity_of(capacity, MEMORY));
    MemoryAllocation {
        usage: usage.memory,
        requests,
        requests_fraction: requests.percentage_of(capacity),
        limits,
        limits_fraction: limits.percentage_of(capacity),
        capacity,
    }
}

fn node_gpu(requests: &ResourceList, limits: &ResourceList, capacity: &ResourceList) -> GpuAllocation {
    let requests = CountQuantity::from_quantity(quantity_of(requests, NVIDIA_GPU));
    let limits = CountQuantity::from_quantity(quantity_of(limits, NVIDIA_GPU));
    let capacity = CountQuantity::from_quantity(quantity_of(capacity, NVIDIA_GPU));
    GpuAllocation {
        requests,
        requests_fraction: requests.percentage_of(capacity),
        limits,
        limits_fraction: limits.percentage_of(capacity),
        capacity,
    }
}

fn node_pods(active: usize, capacity: &ResourceList) -> PodCountAllocation {
    let allocated = CountQuantity::new(i64::try_from(active).unwrap_or(i64::MAX));
    let capacity = CountQuantity::from_quantity(quantity_of(capacity, PODS));
    PodCountAllocation {
        allocated,
        capacity,
        fraction: calc_percentage(allocated.count(), capacity.count()),
    }
}

/// Usage fractions here are relative to the pod's own limit, not node capacity.
pub fn compute_pod_allocation(
    pod: &Pod,
    pod_usage: &PodUsage,
    dimension: Dimension,
) -> Result<PodAllocatedResources, ViewError> {
    let (requests, limits) = sum_requests_and_limits(pod);
    let usage = pod_usage.total();

    let mut allocated = PodAllocatedResources::default();
    match dimension {
        Dimension::Cpu => allocated.cpu = pod_cpu(usage, &requests, &limits),
        Dimension::Memory => allocated.memory = pod_memory(usage, &requests, &limits),
        Dimension::Gpu => allocated.gpu = pod_gpu(&requests, &limits),
        Dimension::All => {
            allocated.cpu = pod_cpu(usage, &requests, &limits);
            allocated.memory = pod_memory(usage, &requests, &limits);
            allocated.gpu = pod_gpu(&requests, &limits);
        }
        Dimension::Pod => {
            return Err(ViewError::UnsupportedDimension {
                token: dimension.token().to_string(),
                allowed: "cpu,memory,gpu".to_string(),
            });
        }
    }
    Ok(allocated)
}

fn pod_cpu(usage: Usage, requests: &ResourceList, limits: &ResourceList) -> PodCpuAllocation {
    let limits = CpuQuantity::from_quantity(quantity_of(limits, CPU));
    PodCpuAllocation {
        usage: usage.cpu,
        usage_fraction: usage.cpu.percentage_of(limits),
        requests: CpuQuantity::from_quantity(quantity_of(requests, CPU)),
        limits,
    }
}

fn pod_memory(usage: Usage, requests: &ResourceList, limits: &ResourceList) -> PodMemoryAllocation {
    let limits = MemoryQuantity::from_quantity(quantity_of(limits, MEMORY));
    PodMemoryAllocation {
        usage: usage.memory,
        usage_fraction: usage.memory.percentage_of(limits),
        requests: MemoryQuantity::from_quantity(quantity_of(requests, MEMORY)),
        limits,
    }
}

fn pod_gpu(requests: &ResourceList, limits: &ResourceList) -> PodGpuAllocation {
    PodGpuAllocation {
        requests: CountQuantity::from_quantity(quantity_of(requests, NVIDIA_GPU)),
        limits: CountQuantity::from_quantity(quantity_of(limits, NVIDIA_GPU)),
    }
}
