use clap::{Args, Parser, Subcommand};

use crate::config::{MAX_TIMEOUT_SECS, ViewConfig, ViewDefaults};
use crate::error::ViewError;
use crate::model::{Dimension, NamespaceScope, Selection, SortKey};
use crate::report::{NodeQuery, PodQuery};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "kubectl-resource-view",
    version,
    about = "Show resource usage, requests and limits of nodes and pods."
)]
pub struct CliArgs {
    /// kubeconfig context to use
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// Deadline for the whole command in seconds [default: 30]
    #[arg(
        long,
        global = true,
        value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_SECS)
    )]
    pub timeout_secs: Option<u64>,

    /// tracing filter (for example: warn,info,debug)
    #[arg(long, global = true, env = "RESOURCE_VIEW_LOG", default_value = "warn")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Display resource usage and allocation of nodes
    #[command(visible_aliases = ["nodes", "no"])]
    Node(NodeArgs),

    /// Display resource usage and allocation of pods
    #[command(visible_aliases = ["pods", "po"])]
    Pod(PodArgs),
}

#[derive(Debug, Clone, Args)]
pub struct NodeArgs {
    /// Node name
    pub name: Option<String>,

    /// Label selector, supports '=', '==' and '!=' (e.g. -l key1=value1,key2=value2)
    #[arg(short = 'l', long)]
    pub selector: Option<String>,

    /// Comma separated resource types: cpu,memory,gpu,pod [default: all]
    #[arg(short = 't', long = "type")]
    pub types: Option<String>,

    /// Sort by cpu or memory usage, highest first
    #[arg(long)]
    pub sort_by: Option<String>,

    /// Print a plain table without borders or colors
    #[arg(long)]
    pub no_format: bool,
}

#[derive(Debug, Clone, Args)]
pub struct PodArgs {
    /// Pod name
    pub name: Option<String>,

    /// Namespace to read pods from [default: kubeconfig namespace]
    #[arg(short = 'n', long)]
    pub namespace: Option<String>,

    /// Read pods from every namespace
    #[arg(short = 'A', long)]
    pub all_namespaces: bool,

    /// Label selector, supports '=', '==' and '!=' (e.g. -l key1=value1,key2=value2)
    #[arg(short = 'l', long)]
    pub selector: Option<String>,

    /// Field selector, supports '=', '==' and '!='
    #[arg(long)]
    pub field_selector: Option<String>,

    /// Comma separated resource types: cpu,memory,gpu [default: all]
    #[arg(short = 't', long = "type")]
    pub types: Option<String>,

    /// Sort by cpu or memory usage, highest first
    #[arg(long)]
    pub sort_by: Option<String>,

    /// Print a plain table without borders or colors
    #[arg(long)]
    pub no_format: bool,
}

/// Where pods are read from once the kubeconfig namespace is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeRequest {
    All,
    Named(String),
    Current,
}

impl ScopeRequest {
    pub fn resolve(self, default_namespace: &str) -> NamespaceScope {
        match self {
            Self::All => NamespaceScope::All,
            Self::Named(namespace) => NamespaceScope::Named(namespace),
            Self::Current => NamespaceScope::Named(default_namespace.to_string()),
        }
    }
}

/// A validated pod request that still needs the kubeconfig namespace.
#[derive(Debug, Clone)]
pub struct PodPlan {
    pub scope: ScopeRequest,
    pub selection: Selection,
    pub dimensions: Vec<Dimension>,
    pub sort_by: Option<SortKey>,
}

impl PodPlan {
    pub fn into_query(self, default_namespace: &str) -> PodQuery {
        PodQuery {
            scope: self.scope.resolve(default_namespace),
            selection: self.selection,
            dimensions: self.dimensions,
            sort_by: self.sort_by,
        }
    }
}

impl NodeArgs {
    pub fn query(&self, config: &ViewConfig) -> Result<NodeQuery, ViewError> {
        let selection = Selection {
            name: self.name.clone(),
            label_selector: self.selector.clone(),
            field_selector: None,
        };
        selection.validate()?;

        Ok(NodeQuery {
            selection,
            dimensions: dimensions(self.types.as_deref(), &config.node, &Dimension::NODE)?,
            sort_by: sort_key(self.sort_by.as_deref(), &config.node)?,
        })
    }

    pub fn plain(&self, config: &ViewConfig) -> bool {
        self.no_format || config.no_format
    }
}

impl PodArgs {
    pub fn plan(&self, config: &ViewConfig) -> Result<PodPlan, ViewError> {
        let selection = Selection {
            name: self.name.clone(),
            label_selector: self.selector.clone(),
            field_selector: self.field_selector.clone(),
        };
        selection.validate()?;
        if self.all_namespaces && selection.name.is_some() {
            return Err(ViewError::NameAcrossNamespaces);
        }

        let scope = if self.all_namespaces {
            ScopeRequest::All
        } else if let Some(namespace) = &self.namespace {
            ScopeRequest::Named(namespace.clone())
        } else {
            ScopeRequest::Current
        };

        Ok(PodPlan {
            scope,
            selection,
            dimensions: dimensions(self.types.as_deref(), &config.pod, &Dimension::POD)?,
            sort_by: sort_key(self.sort_by.as_deref(), &config.pod)?,
        })
    }

    pub fn plain(&self, config: &ViewConfig) -> bool {
        self.no_format || config.no_format
    }
}

fn dimensions(
    flag: Option<&str>,
    defaults: &ViewDefaults,
    allowed: &[Dimension],
) -> Result<Vec<Dimension>, ViewError> {
    match flag {
        Some(raw) => Dimension::parse_list(raw, allowed),
        None => Dimension::parse_list(&defaults.types_list().unwrap_or_default(), allowed),
    }
}

fn sort_key(flag: Option<&str>, defaults: &ViewDefaults) -> Result<Option<SortKey>, ViewError> {
    flag.or(defaults.sort_by.as_deref())
        .map(SortKey::parse)
        .transpose()
}
