//! Scripted in-memory driver for unit tests
//!
//! Nodes match a fixed set of native selectors, can appear only after a
//! number of lookups, and replay scripted attribute / visibility values
//! (the last scripted value sticks).

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::driver::PageDriver;
use crate::locator::NativeSelector;
use crate::utils::errors::{ElementError, ElementResult};

pub(crate) type NodeId = usize;

#[derive(Debug, Default)]
pub(crate) struct MockNode {
    selectors: Vec<NativeSelector>,
    parent: Option<NodeId>,
    present_from: u32,
    displayed: VecDeque<bool>,
    attributes: HashMap<String, VecDeque<Option<String>>>,
    text: String,
    value: String,
    detached: bool,
    read_delay: Duration,
}

impl MockNode {
    pub(crate) fn matching(selector: NativeSelector) -> Self {
        Self {
            selectors: vec![selector],
            displayed: VecDeque::from([true]),
            ..Default::default()
        }
    }

    pub(crate) fn also_matching(mut self, selector: NativeSelector) -> Self {
        self.selectors.push(selector);
        self
    }

    pub(crate) fn child_of(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Only returned from the `n`-th lookup (1-based) onwards
    pub(crate) fn present_from(mut self, n: u32) -> Self {
        self.present_from = n;
        self
    }

    pub(crate) fn displayed(mut self, script: &[bool]) -> Self {
        self.displayed = script.iter().copied().collect();
        self
    }

    pub(crate) fn attribute(mut self, name: &str, script: &[Option<&str>]) -> Self {
        self.attributes.insert(
            name.to_string(),
            script.iter().map(|v| v.map(str::to_string)).collect(),
        );
        self
    }

    pub(crate) fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    /// Every attribute read takes `delay` of (virtual) time
    pub(crate) fn slow_reads(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub(crate) fn detached(mut self) -> Self {
        self.detached = true;
        self
    }
}

fn next_sticky<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

#[derive(Debug, Default)]
struct MockState {
    nodes: Vec<MockNode>,
    lookups: u32,
    attribute_reads: HashMap<(NodeId, String), usize>,
    actions: Vec<String>,
}

#[derive(Debug, Default)]
pub(crate) struct MockDriver {
    state: Mutex<MockState>,
}

impl MockDriver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, node: MockNode) -> NodeId {
        let mut state = self.state.lock();
        state.nodes.push(node);
        state.nodes.len() - 1
    }

    pub(crate) fn lookups(&self) -> u32 {
        self.state.lock().lookups
    }

    pub(crate) fn attribute_reads(&self, id: NodeId, name: &str) -> usize {
        self.state
            .lock()
            .attribute_reads
            .get(&(id, name.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn actions(&self) -> Vec<String> {
        self.state.lock().actions.clone()
    }

    pub(crate) fn value_of(&self, id: NodeId) -> String {
        self.state.lock().nodes[id].value.clone()
    }

    fn lookup(&self, parent: Option<NodeId>, selector: &NativeSelector) -> Vec<NodeId> {
        let mut state = self.state.lock();
        state.lookups += 1;
        let lookups = state.lookups;
        state
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| {
                node.selectors.contains(selector)
                    && lookups >= node.present_from
                    && (parent.is_none() || node.parent == parent)
            })
            .map(|(id, _)| id)
            .collect()
    }

    fn live(&self, id: NodeId) -> ElementResult<()> {
        if self.state.lock().nodes[id].detached {
            return Err(ElementError::Stale(format!(
                "node {} is no longer attached to the page",
                id
            )));
        }
        Ok(())
    }

    fn record(&self, action: String) {
        self.state.lock().actions.push(action);
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    type Element = NodeId;

    async fn find_all(&self, selector: &NativeSelector) -> ElementResult<Vec<NodeId>> {
        Ok(self.lookup(None, selector))
    }

    async fn find_all_within(
        &self,
        parent: &NodeId,
        selector: &NativeSelector,
    ) -> ElementResult<Vec<NodeId>> {
        self.live(*parent)?;
        Ok(self.lookup(Some(*parent), selector))
    }

    async fn attribute(&self, element: &NodeId, name: &str) -> ElementResult<Option<String>> {
        self.live(*element)?;
        let delay = self.state.lock().nodes[*element].read_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock();
        *state
            .attribute_reads
            .entry((*element, name.to_string()))
            .or_insert(0) += 1;
        let node = &mut state.nodes[*element];
        if name == "value" && !node.attributes.contains_key("value") {
            return Ok(Some(node.value.clone()));
        }
        Ok(node
            .attributes
            .get_mut(name)
            .and_then(next_sticky)
            .flatten())
    }

    async fn text(&self, element: &NodeId) -> ElementResult<String> {
        self.live(*element)?;
        Ok(self.state.lock().nodes[*element].text.clone())
    }

    async fn is_displayed(&self, element: &NodeId) -> ElementResult<bool> {
        self.live(*element)?;
        let mut state = self.state.lock();
        Ok(next_sticky(&mut state.nodes[*element].displayed).unwrap_or(false))
    }

    async fn click(&self, element: &NodeId) -> ElementResult<()> {
        self.live(*element)?;
        self.record(format!("click {}", element));
        Ok(())
    }

    async fn clear(&self, element: &NodeId) -> ElementResult<()> {
        self.live(*element)?;
        self.state.lock().nodes[*element].value.clear();
        self.record(format!("clear {}", element));
        Ok(())
    }

    async fn type_text(&self, element: &NodeId, text: &str) -> ElementResult<()> {
        self.live(*element)?;
        self.state.lock().nodes[*element].value.push_str(text);
        self.record(format!("type {} {}", element, text));
        Ok(())
    }

    async fn scroll_into_view(&self, element: &NodeId) -> ElementResult<()> {
        self.live(*element)?;
        self.record(format!("scroll {}", element));
        Ok(())
    }
}
