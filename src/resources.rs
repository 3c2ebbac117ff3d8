use crate::quantity::Quantity;
use k8s_openapi::api::core::v1::{Container, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity as KubeQuantity;
use std::collections::BTreeMap;

pub const CPU: &str = "cpu";
pub const MEMORY: &str = "memory";
pub const PODS: &str = "pods";
pub const NVIDIA_GPU: &str = "nvidia.com/gpu";

pub type ResourceList = BTreeMap<String, Quantity>;

pub fn to_resource_list(raw: Option<&BTreeMap<String, KubeQuantity>>) -> ResourceList {
    raw.into_iter()
        .flatten()
        .map(|(name, quantity)| (name.clone(), Quantity::from_kube(quantity)))
        .collect()
}

pub fn quantity_of(list: &ResourceList, name: &str) -> Quantity {
    list.get(name).copied().unwrap_or_default()
}

pub fn add_resource_list(list: &mut ResourceList, other: &ResourceList) {
    combine(list, other, Quantity::saturating_add);
}

pub fn max_resource_list(list: &mut ResourceList, other: &ResourceList) {
    combine(list, other, std::cmp::max);
}

fn combine<F>(list: &mut ResourceList, other: &ResourceList, op: F)
where
    F: Fn(Quantity, Quantity) -> Quantity,
{
    for (name, quantity) in other {
        list.entry(name.clone())
            .and_modify(|current| *current = op(*current, *quantity))
            .or_insert(*quantity);
    }
}

pub fn sum_requests_and_limits(pod: &Pod) -> (ResourceList, ResourceList) {
    let mut requests = ResourceList::new();
    let mut limits = ResourceList::new();
    let Some(spec) = pod.spec.as_ref() else {
        return (requests, limits);
    };

    for container in &spec.containers {
        let (container_requests, container_limits) = container_resources(container);
        add_resource_list(&mut requests, &container_requests);
        add_resource_list(&mut limits, &container_limits);
    }

    for container in spec.init_containers.iter().flatten() {
        let (container_requests, container_limits) = container_resources(container);
        max_resource_list(&mut requests, &container_requests);
        max_resource_list(&mut limits, &container_limits);
    }

    if let Some(overhead) = spec.overhead.as_ref() {
        let overhead = to_resource_list(Some(overhead));
        add_resource_list(&mut requests, &overhead);
        // unbounded limits stay unbounded
        for (name, quantity) in &overhead {
            if let Some(limit) = limits.get_mut(name)
                && !limit.is_zero()
            {
                *limit = limit.saturating_add(*quantity);
            }
        }
    }

    (requests, limits)
}

pub fn sum_pods<'a>(pods: impl IntoIterator<Item = &'a Pod>) -> (ResourceList, ResourceList) {
    pods.into_iter().fold(
        (ResourceList::new(), ResourceList::new()),
        |(mut requests, mut limits), pod| {
            let (pod_requests, pod_limits) = sum_requests_and_limits(pod);
            add_resource_list(&mut requests, &pod_requests);
            add_resource_list(&mut limits, &pod_limits);
            (requests, limits)
        },
    )
}

fn container_resources(container: &Container) -> (ResourceList, ResourceList) {
    let resources = container.resources.as_ref();
    (
        to_resource_list(resources.and_then(|resources| resources.requests.as_ref())),
        to_resource_list(resources.and_then(|resources| resources.limits.as_ref())),
    )
}
