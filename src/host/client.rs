//! Service Client
//!
//! Typed accessors over the [`OperationInvoker`]. Every call, including
//! progress and result queries, goes through the invoker so that fault
//! handling is uniform.

use std::collections::VecDeque;

use omws_protocol::{Operation, Progress, Ticket, PING_OK};
use serde_json::{json, Value};

use super::invoker::{InvokeError, InvokeResult, OperationInvoker};

/// Typed client for the modeling web service
pub struct ServiceClient {
    invoker: OperationInvoker,
}

impl ServiceClient {
    pub fn new(invoker: OperationInvoker) -> Self {
        Self { invoker }
    }

    pub fn invoker(&self) -> &OperationInvoker {
        &self.invoker
    }

    /// Raw call through the invoker
    pub fn call(&self, operation: Operation, payload: Value) -> InvokeResult<Value> {
        self.invoker.invoke(operation, payload)
    }

    /// Returns true when the service answers `1`
    pub fn ping(&self) -> InvokeResult<bool> {
        let payload = self.call(Operation::Ping, Value::Null)?;
        Ok(as_integer(&payload) == Some(PING_OK))
    }

    /// List available algorithms
    pub fn get_algorithms(&self) -> InvokeResult<Vec<AlgorithmInfo>> {
        let payload = self.call(Operation::GetAlgorithms, Value::Null)?;
        let list = payload
            .get("Algorithms")
            .and_then(|a| a.get("Algorithm"))
            .ok_or_else(|| {
                protocol(
                    Operation::GetAlgorithms,
                    "response has no Algorithms/Algorithm element",
                )
            })?;

        Ok(one_or_many(list)
            .into_iter()
            .filter_map(|alg| {
                let id = alg.get("Id")?.as_str()?.to_string();
                let name = alg.get("Name").and_then(Value::as_str).map(String::from);
                Some(AlgorithmInfo { id, name })
            })
            .collect())
    }

    /// Fetch the layer-group tree and flatten it
    pub fn get_layers(&self) -> InvokeResult<LayerCatalog> {
        let payload = self.call(Operation::GetLayers, Value::Null)?;
        Ok(LayerCatalog::from_tree(&payload))
    }

    /// Submit a job and return its ticket(s)
    ///
    /// Single-job operations answer with the ticket itself; `runExperiment`
    /// answers with `{"Job": [{"Ticket": ...}, ...]}`.
    pub fn submit(&self, operation: Operation, params: Value) -> InvokeResult<Vec<Ticket>> {
        let payload = self.call(operation, params)?;

        let tickets: Vec<Ticket> = match payload.get("Job") {
            Some(jobs) => one_or_many(jobs)
                .into_iter()
                .map(|job| job.get("Ticket").and_then(value_to_string).and_then(Ticket::new))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| protocol(operation, "job without ticket in response"))?,
            None => value_to_string(&payload).and_then(Ticket::new).into_iter().collect(),
        };

        if tickets.is_empty() {
            return Err(protocol(operation, "response carried no ticket"));
        }
        Ok(tickets)
    }

    /// Query progress for a ticket
    pub fn get_progress(&self, ticket: &Ticket) -> InvokeResult<Progress> {
        let payload = self.call(Operation::GetProgress, json!(ticket.as_str()))?;
        let code = as_integer(&payload).ok_or_else(|| {
            protocol(
                Operation::GetProgress,
                format!("returned non-integer progress {}", payload),
            )
        })?;
        Progress::from_code(code).map_err(|e| protocol(Operation::GetProgress, e.to_string()))
    }

    /// Fetch the result of a finished job
    pub fn get_result(&self, operation: Operation, tickets: &[Ticket]) -> InvokeResult<Value> {
        self.call(operation, json!(Ticket::join(tickets)))
    }

    /// Fetch the job log
    pub fn get_log(&self, ticket: &Ticket) -> InvokeResult<String> {
        let payload = self.call(Operation::GetLog, json!(ticket.as_str()))?;
        value_to_string(&payload).ok_or_else(|| protocol(Operation::GetLog, "log is not text"))
    }

    /// Fetch the download URL of a projected layer
    pub fn get_layer_as_url(&self, ticket: &Ticket) -> InvokeResult<String> {
        let payload = self.call(Operation::GetLayerAsUrl, json!(ticket.as_str()))?;
        value_to_string(&payload)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| protocol(Operation::GetLayerAsUrl, "response carried no URL"))
    }
}

fn protocol(operation: Operation, detail: impl Into<String>) -> InvokeError {
    InvokeError::Protocol {
        operation,
        detail: detail.into(),
    }
}

/// Integers may arrive as JSON numbers or as numeric strings
pub fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A repeated element decodes to an array, a single one to an object
pub fn one_or_many(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

/// Algorithm entry from `getAlgorithms`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmInfo {
    pub id: String,
    pub name: Option<String>,
}

/// Flattened view of the `getLayers` tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerCatalog {
    /// Layer ids in breadth-first order
    pub layer_ids: Vec<String>,
    /// Number of groups visited, the root included
    pub groups: usize,
}

impl LayerCatalog {
    /// Breadth-first traversal over `Layer` and nested `LayersGroup` entries
    pub fn from_tree(root: &Value) -> Self {
        let mut catalog = LayerCatalog::default();
        let mut queue: VecDeque<&Value> = VecDeque::from([root]);

        while let Some(group) = queue.pop_front() {
            catalog.groups += 1;
            if let Some(layers) = group.get("Layer") {
                for layer in one_or_many(layers) {
                    if let Some(id) = layer.get("Id").and_then(Value::as_str) {
                        catalog.layer_ids.push(id.to_string());
                    }
                }
            }
            if let Some(subgroups) = group.get("LayersGroup") {
                queue.extend(one_or_many(subgroups));
            }
        }

        catalog
    }

    pub fn len(&self) -> usize {
        self.layer_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layer_ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.layer_ids.iter().any(|l| l == id)
    }
}
