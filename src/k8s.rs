use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIGroupList;
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::{Api, Client, Config, ResourceExt};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::allocation::is_active_on;
use crate::error::ViewError;
use crate::model::{ContainerUsage, NamespaceScope, NodeUsage, PodUsage, Selection, Usage};
use crate::quantity::{CpuQuantity, MemoryQuantity, Quantity};
use crate::resources::{CPU, MEMORY};

pub const METRICS_GROUP: &str = "metrics.k8s.io";
pub const METRICS_VERSION: &str = "v1beta1";

#[async_trait]
pub trait ClusterSource: Send + Sync + 'static {
    async fn metrics_api_available(&self) -> Result<bool, ViewError>;

    async fn nodes(&self, selection: &Selection) -> Result<Vec<Node>, ViewError>;

    async fn node_metrics(&self, selection: &Selection) -> Result<Vec<NodeUsage>, ViewError>;

    async fn pod_metrics(
        &self,
        scope: &NamespaceScope,
        selection: &Selection,
    ) -> Result<Vec<PodUsage>, ViewError>;

    /// Pods scheduled on `node_name` that have not terminated.
    async fn active_pods_on(&self, node_name: &str) -> Result<Vec<Pod>, ViewError>;

    async fn pod(&self, namespace: &str, name: &str) -> Result<Pod, ViewError>;
}

#[derive(Clone)]
pub struct KubeGateway {
    client: Client,
    default_namespace: String,
}

impl KubeGateway {
    pub async fn new(context: Option<String>) -> Result<Self> {
        let config = match Kubeconfig::read().ok() {
            Some(kubeconfig) => {
                let options = KubeConfigOptions {
                    context: context.clone(),
                    cluster: None,
                    user: None,
                };
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .context("failed to infer Kubernetes configuration")?
            }
            None => {
                if context.is_some() {
                    anyhow::bail!("kubeconfig not found; --context is unavailable in this environment");
                }
                Config::infer()
                    .await
                    .context("failed to infer Kubernetes configuration")?
            }
        };

        let default_namespace = config.default_namespace.clone();
        let client = Client::try_from(config).context("failed to initialize Kubernetes client")?;
        debug!(?context, %default_namespace, "kubernetes client ready");

        Ok(Self {
            client,
            default_namespace,
        })
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    fn node_metrics_api(&self) -> Api<DynamicObject> {
        Api::all_with(self.client.clone(), &metrics_resource("NodeMetrics", "nodes"))
    }

    fn pod_metrics_api(&self, scope: &NamespaceScope) -> Api<DynamicObject> {
        let resource = metrics_resource("PodMetrics", "pods");
        match scope {
            NamespaceScope::All => Api::all_with(self.client.clone(), &resource),
            NamespaceScope::Named(namespace) => {
                Api::namespaced_with(self.client.clone(), namespace, &resource)
            }
        }
    }
}

#[async_trait]
impl ClusterSource for KubeGateway {
    #[instrument(skip(self))]
    async fn metrics_api_available(&self) -> Result<bool, ViewError> {
        let groups = self
            .client
            .list_api_groups()
            .await
            .map_err(|source| ViewError::kube("discover API groups", source))?;
        Ok(serves_metrics_api(&groups))
    }

    #[instrument(skip(self))]
    async fn nodes(&self, selection: &Selection) -> Result<Vec<Node>, ViewError> {
        let api: Api<Node> = Api::all(self.client.clone());
        if let Some(name) = selection.name.as_deref() {
            let node = api
                .get(name)
                .await
                .map_err(|source| ViewError::kube(format!("get node {name}"), source))?;
            return Ok(vec![node]);
        }

        let nodes = api
            .list(&list_params(selection))
            .await
            .map_err(|source| ViewError::kube("list nodes", source))?;
        Ok(nodes.items)
    }

    #[instrument(skip(self))]
    async fn node_metrics(&self, selection: &Selection) -> Result<Vec<NodeUsage>, ViewError> {
        let api = self.node_metrics_api();
        if let Some(name) = selection.name.as_deref() {
            let metric = api
                .get(name)
                .await
                .map_err(|source| ViewError::kube(format!("get metrics for node {name}"), source))?;
            return Ok(vec![node_usage(&metric)]);
        }

        let metrics = api
            .list(&list_params(selection))
            .await
            .map_err(|source| ViewError::kube("list node metrics", source))?;
        Ok(metrics.items.iter().map(node_usage).collect())
    }

    #[instrument(skip(self))]
    async fn pod_metrics(
        &self,
        scope: &NamespaceScope,
        selection: &Selection,
    ) -> Result<Vec<PodUsage>, ViewError> {
        let api = self.pod_metrics_api(scope);
        if let Some(name) = selection.name.as_deref() {
            if *scope == NamespaceScope::All {
                return Err(ViewError::NameAcrossNamespaces);
            }
            let metric = api
                .get(name)
                .await
                .map_err(|source| ViewError::kube(format!("get metrics for pod {name}"), source))?;
            return Ok(vec![pod_usage(&metric)]);
        }

        let metrics = api
            .list(&list_params(selection))
            .await
            .map_err(|source| ViewError::kube(format!("list pod metrics in {scope}"), source))?;
        Ok(metrics.items.iter().map(pod_usage).collect())
    }

    #[instrument(skip(self))]
    async fn active_pods_on(&self, node_name: &str) -> Result<Vec<Pod>, ViewError> {
        let api: Api<Pod> = Api::all(self.client.clone());
        let params = ListParams::default().fields(&active_pods_selector(node_name));
        let pods = api
            .list(&params)
            .await
            .map_err(|source| ViewError::kube(format!("list pods on node {node_name}"), source))?;

        let active = pods
            .items
            .into_iter()
            .filter(|pod| is_active_on(pod, node_name))
            .collect::<Vec<_>>();
        debug!(count = active.len(), "active pods");
        Ok(active)
    }

    #[instrument(skip(self))]
    async fn pod(&self, namespace: &str, name: &str) -> Result<Pod, ViewError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .map_err(|source| ViewError::kube(format!("get pod {namespace}/{name}"), source))
    }
}

fn metrics_resource(kind: &str, plural: &str) -> ApiResource {
    let gvk = GroupVersionKind::gvk(METRICS_GROUP, METRICS_VERSION, kind);
    ApiResource::from_gvk_with_plural(&gvk, plural)
}

fn list_params(selection: &Selection) -> ListParams {
    let mut params = ListParams::default();
    if let Some(labels) = selection.label_selector.as_deref() {
        params = params.labels(labels);
    }
    if let Some(fields) = selection.field_selector.as_deref() {
        params = params.fields(fields);
    }
    params
}

fn active_pods_selector(node_name: &str) -> String {
    format!("spec.nodeName={node_name},status.phase!=Succeeded,status.phase!=Failed")
}

fn serves_metrics_api(groups: &APIGroupList) -> bool {
    groups
        .groups
        .iter()
        .filter(|group| group.name == METRICS_GROUP)
        .flat_map(|group| &group.versions)
        .any(|version| version.version == METRICS_VERSION)
}

fn node_usage(metric: &DynamicObject) -> NodeUsage {
    NodeUsage {
        name: metric.name_any(),
        usage: usage_from_value(&metric.data["usage"]),
    }
}

fn pod_usage(metric: &DynamicObject) -> PodUsage {
    let containers = metric
        .data
        .get("containers")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|container| ContainerUsage {
            name: container
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            usage: container
                .get("usage")
                .map(usage_from_value)
                .unwrap_or_default(),
        })
        .collect();

    PodUsage {
        namespace: metric.namespace().unwrap_or_default(),
        name: metric.name_any(),
        containers,
    }
}

fn usage_from_value(value: &Value) -> Usage {
    let quantity = |resource: &str| {
        value
            .get(resource)
            .and_then(Value::as_str)
            .map(Quantity::parse_lenient)
            .unwrap_or_default()
    };
    Usage {
        cpu: CpuQuantity::from_quantity(quantity(CPU)),
        memory: MemoryQuantity::from_quantity(quantity(MEMORY)),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        active_pods_selector, list_params, node_usage, pod_usage, serves_metrics_api,
        usage_from_value,
    };
    use crate::model::Selection;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIGroupList;
    use kube::core::DynamicObject;
    use serde_json::json;

    fn metric(value: serde_json::Value) -> DynamicObject {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn usage_parsing_handles_metrics_server_units() {
        let usage = usage_from_value(&json!({ "cpu": "250000000n", "memory": "131072Ki" }));
        assert_eq!(usage.cpu.milli(), 250);
        assert_eq!(usage.memory.bytes(), 128 * 1_048_576);
    }

    #[test]
    fn malformed_usage_counts_as_zero() {
        let usage = usage_from_value(&json!({ "cpu": "lots", "memory": 12 }));
        assert_eq!(usage.cpu.milli(), 0);
        assert_eq!(usage.memory.bytes(), 0);
    }

    #[test]
    fn node_metrics_read_the_usage_block() {
        let usage = node_usage(&metric(json!({
            "apiVersion": "metrics.k8s.io/v1beta1",
            "kind": "NodeMetrics",
            "metadata": { "name": "node1" },
            "timestamp": "2024-01-01T00:00:00Z",
            "window": "10s",
            "usage": { "cpu": "1500m", "memory": "2Gi" }
        })));

        assert_eq!(usage.name, "node1");
        assert_eq!(usage.usage.cpu.milli(), 1_500);
        assert_eq!(usage.usage.memory.bytes(), 2 * 1_073_741_824);
    }

    #[test]
    fn pod_metrics_keep_every_container() {
        let usage = pod_usage(&metric(json!({
            "apiVersion": "metrics.k8s.io/v1beta1",
            "kind": "PodMetrics",
            "metadata": { "name": "web", "namespace": "shop" },
            "containers": [
                { "name": "app", "usage": { "cpu": "100m", "memory": "64Mi" } },
                { "name": "sidecar", "usage": { "cpu": "5m", "memory": "16Mi" } }
            ]
        })));

        assert_eq!(usage.key(), "shop/web");
        assert_eq!(usage.containers.len(), 2);
        assert_eq!(usage.containers[1].name, "sidecar");
        assert_eq!(usage.total().cpu.milli(), 105);
        assert_eq!(usage.total().memory.bytes(), 80 * 1_048_576);
    }

    #[test]
    fn pod_metrics_without_containers_are_empty() {
        let usage = pod_usage(&metric(json!({
            "apiVersion": "metrics.k8s.io/v1beta1",
            "kind": "PodMetrics",
            "metadata": { "name": "idle", "namespace": "default" }
        })));
        assert!(usage.containers.is_empty());
    }

    #[test]
    fn metrics_api_needs_the_served_version() {
        let groups = |versions: serde_json::Value| -> APIGroupList {
            serde_json::from_value(json!({
                "groups": [
                    { "name": "apps", "versions": [
                        { "groupVersion": "apps/v1", "version": "v1" }
                    ]},
                    { "name": "metrics.k8s.io", "versions": versions }
                ]
            }))
            .unwrap()
        };

        assert!(serves_metrics_api(&groups(json!([
            { "groupVersion": "metrics.k8s.io/v1beta1", "version": "v1beta1" }
        ]))));
        assert!(!serves_metrics_api(&groups(json!([
            { "groupVersion": "metrics.k8s.io/v1alpha1", "version": "v1alpha1" }
        ]))));
    }

    #[test]
    fn selectors_flow_into_list_params() {
        let params = list_params(&Selection {
            name: None,
            label_selector: Some("app=web".to_string()),
            field_selector: Some("metadata.namespace!=kube-system".to_string()),
        });
        assert_eq!(params.label_selector.as_deref(), Some("app=web"));
        assert_eq!(
            params.field_selector.as_deref(),
            Some("metadata.namespace!=kube-system")
        );

        let params = list_params(&Selection::default());
        assert!(params.label_selector.is_none());
        assert!(params.field_selector.is_none());
    }

    #[test]
    fn active_pod_selector_excludes_terminal_phases() {
        assert_eq!(
            active_pods_selector("node1"),
            "spec.nodeName=node1,status.phase!=Succeeded,status.phase!=Failed"
        );
    }
}
