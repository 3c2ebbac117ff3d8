use crate::error::ViewError;
use crate::quantity::{CpuQuantity, MemoryQuantity};
use std::cmp::Reverse;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Dimension {
    Cpu,
    Memory,
    Gpu,
    Pod,
    All,
}

impl Dimension {
    pub const NODE: [Self; 4] = [Self::Cpu, Self::Memory, Self::Gpu, Self::Pod];
    pub const POD: [Self; 3] = [Self::Cpu, Self::Memory, Self::Gpu];

    pub fn token(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Gpu => "gpu",
            Self::Pod => "pod",
            Self::All => "all",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "cpu" => Some(Self::Cpu),
            "memory" => Some(Self::Memory),
            "gpu" => Some(Self::Gpu),
            "pod" => Some(Self::Pod),
            _ => None,
        }
    }

    /// Parses a `-t cpu,memory` list. An empty list selects every dimension.
    pub fn parse_list(raw: &str, allowed: &[Self]) -> Result<Vec<Self>, ViewError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(vec![Self::All]);
        }

        raw.split(',')
            .map(str::trim)
            .map(|token| {
                Self::from_token(token)
                    .filter(|dimension| allowed.contains(dimension))
                    .ok_or_else(|| ViewError::UnsupportedDimension {
                        token: token.to_string(),
                        allowed: allowed
                            .iter()
                            .map(|dimension| dimension.token())
                            .collect::<Vec<_>>()
                            .join(","),
                    })
            })
            .collect()
    }
}

impl Display for Dimension {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SortKey {
    Cpu,
    Memory,
}

impl SortKey {
    pub fn parse(raw: &str) -> Result<Self, ViewError> {
        match raw.trim() {
            "cpu" => Ok(Self::Cpu),
            "memory" => Ok(Self::Memory),
            other => Err(ViewError::InvalidSortKey(other.to_string())),
        }
    }

    pub fn sort_nodes(self, nodes: &mut [NodeUsage]) {
        nodes.sort_by(|a, b| {
            Reverse(a.usage.amount(self))
                .cmp(&Reverse(b.usage.amount(self)))
                .then_with(|| a.name.cmp(&b.name))
        });
    }

    pub fn sort_pods(self, pods: &mut [PodUsage]) {
        pods.sort_by_cached_key(|pod| {
            (
                Reverse(pod.total().amount(self)),
                pod.namespace.clone(),
                pod.name.clone(),
            )
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NamespaceScope {
    All,
    Named(String),
}

impl Display for NamespaceScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Named(namespace) => write!(f, "{namespace}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub name: Option<String>,
    pub label_selector: Option<String>,
    pub field_selector: Option<String>,
}

impl Selection {
    pub fn validate(&self) -> Result<(), ViewError> {
        if self.name.is_some() && self.label_selector.is_some() {
            return Err(ViewError::NameWithSelector);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub cpu: CpuQuantity,
    pub memory: MemoryQuantity,
}

impl Usage {
    pub fn saturating_add(self, other: Self) -> Self {
        Self {
            cpu: CpuQuantity::new(self.cpu.milli().saturating_add(other.cpu.milli())),
            memory: MemoryQuantity::new(self.memory.bytes().saturating_add(other.memory.bytes())),
        }
    }

    fn amount(self, key: SortKey) -> i64 {
        match key {
            SortKey::Cpu => self.cpu.milli(),
            SortKey::Memory => self.memory.bytes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeUsage {
    pub name: String,
    pub usage: Usage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerUsage {
    pub name: String,
    pub usage: Usage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodUsage {
    pub namespace: String,
    pub name: String,
    pub containers: Vec<ContainerUsage>,
}

impl PodUsage {
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    pub fn total(&self) -> Usage {
        self.containers
            .iter()
            .fold(Usage::default(), |total, container| {
                total.saturating_add(container.usage)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{ContainerUsage, Dimension, NodeUsage, PodUsage, Selection, SortKey, Usage};
    use crate::error::ViewError;
    use crate::quantity::{CpuQuantity, MemoryQuantity};

    fn usage(cpu: i64, memory: i64) -> Usage {
        Usage {
            cpu: CpuQuantity::new(cpu),
            memory: MemoryQuantity::new(memory),
        }
    }

    fn node(name: &str, cpu: i64, memory: i64) -> NodeUsage {
        NodeUsage {
            name: name.to_string(),
            usage: usage(cpu, memory),
        }
    }

    #[test]
    fn empty_type_list_selects_all() {
        assert_eq!(
            Dimension::parse_list("", &Dimension::NODE).unwrap(),
            vec![Dimension::All]
        );
        assert_eq!(
            Dimension::parse_list("  ", &Dimension::POD).unwrap(),
            vec![Dimension::All]
        );
    }

    #[test]
    fn type_list_keeps_requested_order() {
        assert_eq!(
            Dimension::parse_list("pod,cpu, gpu", &Dimension::NODE).unwrap(),
            vec![Dimension::Pod, Dimension::Cpu, Dimension::Gpu]
        );
    }

    #[test]
    fn pod_dimension_is_rejected_for_pods() {
        let error = Dimension::parse_list("cpu,pod", &Dimension::POD).unwrap_err();
        assert!(matches!(
            error,
            ViewError::UnsupportedDimension { ref token, ref allowed }
                if token == "pod" && allowed == "cpu,memory,gpu"
        ));
    }

    #[test]
    fn unknown_and_empty_tokens_are_rejected() {
        assert!(Dimension::parse_list("disk", &Dimension::NODE).is_err());
        assert!(Dimension::parse_list("cpu,", &Dimension::NODE).is_err());
        assert!(Dimension::parse_list("all", &Dimension::NODE).is_err());
    }

    #[test]
    fn sort_key_accepts_cpu_and_memory_only() {
        assert_eq!(SortKey::parse("cpu").unwrap(), SortKey::Cpu);
        assert_eq!(SortKey::parse("memory").unwrap(), SortKey::Memory);
        assert!(matches!(
            SortKey::parse("pods"),
            Err(ViewError::InvalidSortKey(key)) if key == "pods"
        ));
    }

    #[test]
    fn nodes_sort_by_usage_descending_then_name() {
        let mut nodes = vec![
            node("b", 100, 900),
            node("a", 100, 100),
            node("c", 300, 500),
        ];

        SortKey::Cpu.sort_nodes(&mut nodes);
        let names = nodes.iter().map(|n| n.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["c", "a", "b"]);

        SortKey::Memory.sort_nodes(&mut nodes);
        let names = nodes.iter().map(|n| n.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["b", "c", "a"]);
    }

    #[test]
    fn pods_sort_by_summed_container_usage() {
        let pod = |name: &str, cpus: &[i64]| PodUsage {
            namespace: "default".to_string(),
            name: name.to_string(),
            containers: cpus
                .iter()
                .map(|cpu| ContainerUsage {
                    name: "c".to_string(),
                    usage: usage(*cpu, 0),
                })
                .collect(),
        };
        let mut pods = vec![pod("small", &[50]), pod("split", &[60, 60]), pod("big", &[100])];

        SortKey::Cpu.sort_pods(&mut pods);
        let names = pods.iter().map(|p| p.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["split", "big", "small"]);
        assert_eq!(pods[0].total().cpu.milli(), 120);
        assert_eq!(pods[0].key(), "default/split");
    }

    #[test]
    fn name_and_label_selector_are_exclusive() {
        let selection = Selection {
            name: Some("node1".to_string()),
            label_selector: Some("role=worker".to_string()),
            field_selector: None,
        };
        assert!(matches!(
            selection.validate(),
            Err(ViewError::NameWithSelector)
        ));

        let by_fields = Selection {
            name: Some("web".to_string()),
            field_selector: Some("status.phase=Running".to_string()),
            ..Selection::default()
        };
        assert!(by_fields.validate().is_ok());
    }
}
