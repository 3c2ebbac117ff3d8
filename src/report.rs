use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, trace, warn};

use crate::allocation::{
    NodeLoad, NodeMetricsIndex, compute_pod_allocation, index_node_metrics,
};
use crate::error::ViewError;
use crate::fanout::fan_out;
use crate::format::{Row, RowStyle, node_row, pod_row};
use crate::k8s::ClusterSource;
use crate::model::{Dimension, NamespaceScope, PodUsage, Selection, SortKey};

#[derive(Debug, Clone)]
pub struct NodeQuery {
    pub selection: Selection,
    pub dimensions: Vec<Dimension>,
    pub sort_by: Option<SortKey>,
}

#[derive(Debug, Clone)]
pub struct PodQuery {
    pub scope: NamespaceScope,
    pub selection: Selection,
    pub dimensions: Vec<Dimension>,
    pub sort_by: Option<SortKey>,
}

struct NodeContext {
    metrics: NodeMetricsIndex,
    dimensions: Vec<Dimension>,
    style: RowStyle,
}

pub async fn ensure_metrics_api<S: ClusterSource + ?Sized>(source: &S) -> Result<(), ViewError> {
    if source.metrics_api_available().await? {
        Ok(())
    } else {
        Err(ViewError::MetricsApiUnavailable)
    }
}

async fn within<T>(
    deadline: Instant,
    work: impl Future<Output = Result<T, ViewError>>,
) -> Result<T, ViewError> {
    timeout_at(deadline, work)
        .await
        .map_err(|_| ViewError::Timeout)?
}

pub async fn node_report<S: ClusterSource>(
    source: Arc<S>,
    query: &NodeQuery,
    style: RowStyle,
    deadline: Instant,
) -> Result<Vec<Row>, ViewError> {
    within(deadline, ensure_metrics_api(source.as_ref())).await?;

    let (nodes, mut metrics) = within(deadline, async {
        futures::try_join!(
            source.nodes(&query.selection),
            source.node_metrics(&query.selection)
        )
    })
    .await?;
    debug!(nodes = nodes.len(), metrics = metrics.len(), "node inventory");

    if let Some(key) = query.sort_by {
        key.sort_nodes(&mut metrics);
    }

    let mut by_name = nodes
        .into_iter()
        .map(|node| (node.name_any(), node))
        .collect::<HashMap<_, _>>();
    let entities = metrics
        .iter()
        .filter_map(|usage| match by_name.remove(&usage.name) {
            Some(node) => Some((usage.name.clone(), node)),
            None => {
                warn!(node = %usage.name, "metrics reported for an unlisted node");
                None
            }
        })
        .collect::<Vec<_>>();

    let context = Arc::new(NodeContext {
        metrics: index_node_metrics(&metrics),
        dimensions: query.dimensions.clone(),
        style,
    });
    fan_out(entities, deadline, move |node: Node| {
        let source = Arc::clone(&source);
        let context = Arc::clone(&context);
        async move {
            build_node_row(
                source.as_ref(),
                &node,
                &context.metrics,
                &context.dimensions,
                &context.style,
            )
            .await
        }
    })
    .await
}

pub async fn build_node_row<S: ClusterSource + ?Sized>(
    source: &S,
    node: &Node,
    metrics: &NodeMetricsIndex,
    dimensions: &[Dimension],
    style: &RowStyle,
) -> Result<Row, ViewError> {
    let name = node.name_any();
    let pods = source.active_pods_on(&name).await?;
    let load = NodeLoad::new(node, &pods, metrics);
    let blocks = dimensions
        .iter()
        .map(|dimension| (*dimension, load.allocation(*dimension)))
        .collect::<Vec<_>>();

    let gpu = blocks
        .iter()
        .find(|(dimension, _)| matches!(dimension, Dimension::Gpu | Dimension::All))
        .map(|(_, allocated)| allocated.gpu);
    if let Some(gpu) = gpu
        && gpu.requests.count() > gpu.capacity.count()
    {
        warn!(node = %name, requests = %gpu.requests, capacity = %gpu.capacity, "gpu requests exceed node capacity");
    }
    Ok(node_row(&name, &blocks, style))
}

pub async fn pod_report<S: ClusterSource>(
    source: Arc<S>,
    query: &PodQuery,
    style: RowStyle,
    deadline: Instant,
) -> Result<Vec<Row>, ViewError> {
    within(deadline, ensure_metrics_api(source.as_ref())).await?;

    let mut metrics = within(
        deadline,
        source.pod_metrics(&query.scope, &query.selection),
    )
    .await?;
    debug!(pods = metrics.len(), scope = %query.scope, "pod metrics");

    if let Some(key) = query.sort_by {
        key.sort_pods(&mut metrics);
    }

    let entities = metrics
        .into_iter()
        .map(|usage| (usage.key(), usage))
        .collect::<Vec<_>>();
    let dimensions = Arc::new(query.dimensions.clone());
    fan_out(entities, deadline, move |usage: PodUsage| {
        let source = Arc::clone(&source);
        let dimensions = Arc::clone(&dimensions);
        async move { build_pod_row(source.as_ref(), &usage, &dimensions, &style).await }
    })
    .await
}

pub async fn build_pod_row<S: ClusterSource + ?Sized>(
    source: &S,
    usage: &PodUsage,
    dimensions: &[Dimension],
    style: &RowStyle,
) -> Result<Row, ViewError> {
    let pod = source.pod(&usage.namespace, &usage.name).await?;
    for container in &usage.containers {
        trace!(
            pod = %usage.key(),
            container = %container.name,
            cpu = %container.usage.cpu,
            memory = %container.usage.memory,
            "container usage"
        );
    }
    let blocks = dimensions
        .iter()
        .map(|dimension| {
            compute_pod_allocation(&pod, usage, *dimension).map(|allocated| (*dimension, allocated))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(pod_row(&usage.namespace, &usage.name, &blocks, style))
}

pub fn no_resources_message(scope: &NamespaceScope) -> String {
    match scope {
        NamespaceScope::All => "No resources found".to_string(),
        NamespaceScope::Named(namespace) => {
            format!("No resources found in {namespace} namespace.")
        }
    }
}
