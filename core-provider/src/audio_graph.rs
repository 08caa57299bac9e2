//! Shared audio graph and the audio-gain capability.
//!
//! One host audio context serves every playback surface. It is created on
//! first use and closed when the last live node (gain or source) is released.
//! The count is per node, not per adapter, because one surface may only ever
//! hold a gain node while another only holds a source node.

use crate::error::{ProviderError, Result};
use bridge_traits::{AudioContext, AudioContextFactory, GainNode, MediaElement, SourceNode};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct SharedAudioGraph {
    factory: Arc<dyn AudioContextFactory>,
    state: Mutex<GraphState>,
}

#[derive(Default)]
struct GraphState {
    context: Option<Arc<dyn AudioContext>>,
    live_nodes: usize,
}

impl SharedAudioGraph {
    pub fn new(factory: Arc<dyn AudioContextFactory>) -> Arc<Self> {
        Arc::new(Self {
            factory,
            state: Mutex::new(GraphState::default()),
        })
    }

    /// Whether a context can be created right now. Not cached: availability
    /// can change at runtime.
    pub fn is_available(&self) -> bool {
        self.factory.is_available()
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().context.is_some()
    }

    pub fn live_nodes(&self) -> usize {
        self.state.lock().live_nodes
    }

    /// Acquire the context and count one more live node.
    fn retain(self: &Arc<Self>) -> Result<(Arc<dyn AudioContext>, NodeLease)> {
        let mut state = self.state.lock();
        let context = match &state.context {
            Some(context) => Arc::clone(context),
            None => {
                let context = self.factory.create_context()?;
                tracing::debug!("audio context created");
                state.context = Some(Arc::clone(&context));
                context
            }
        };
        state.live_nodes += 1;
        Ok((
            context,
            NodeLease {
                graph: Arc::clone(self),
                released: AtomicBool::new(false),
            },
        ))
    }

    fn release(&self) {
        let closing = {
            let mut state = self.state.lock();
            state.live_nodes = state.live_nodes.saturating_sub(1);
            if state.live_nodes == 0 {
                state.context.take()
            } else {
                None
            }
        };
        if let Some(context) = closing {
            tracing::debug!("audio context closed");
            context.close();
        }
    }

    pub fn create_gain(self: &Arc<Self>) -> Result<LeasedGain> {
        let (context, lease) = self.retain()?;
        match context.create_gain() {
            Ok(node) => Ok(LeasedGain { node, lease }),
            Err(err) => {
                lease.release();
                Err(err.into())
            }
        }
    }

    pub fn create_source(self: &Arc<Self>, element: &Arc<dyn MediaElement>) -> Result<LeasedSource> {
        let (context, lease) = self.retain()?;
        match context.create_element_source(element) {
            Ok(node) => Ok(LeasedSource { node, lease }),
            Err(err) => {
                lease.release();
                Err(err.into())
            }
        }
    }
}

/// One reference on the shared context; released once, explicitly or on drop.
pub struct NodeLease {
    graph: Arc<SharedAudioGraph>,
    released: AtomicBool,
}

impl NodeLease {
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.graph.release();
        }
    }
}

impl Drop for NodeLease {
    fn drop(&mut self) {
        self.release();
    }
}

pub struct LeasedGain {
    pub node: Box<dyn GainNode>,
    lease: NodeLease,
}

impl LeasedGain {
    pub fn release(self) {
        self.node.disconnect();
        self.lease.release();
    }
}

pub struct LeasedSource {
    pub node: Box<dyn SourceNode>,
    lease: NodeLease,
}

impl LeasedSource {
    pub fn release(self) {
        self.node.disconnect();
        self.lease.release();
    }
}

// ============================================================================
// Audio Gain Capability
// ============================================================================

/// Routes an element through a gain node when gain differs from 1.
pub struct AudioGainAdapter {
    graph: Option<Arc<SharedAudioGraph>>,
    element: Arc<dyn MediaElement>,
    nodes: Mutex<Option<(LeasedSource, LeasedGain)>>,
}

impl AudioGainAdapter {
    pub fn new(graph: Option<Arc<SharedAudioGraph>>, element: Arc<dyn MediaElement>) -> Self {
        Self {
            graph,
            element,
            nodes: Mutex::new(None),
        }
    }

    pub fn supported(&self) -> bool {
        self.graph
            .as_ref()
            .map(|graph| graph.is_available())
            .unwrap_or(false)
    }

    pub fn gain(&self) -> Option<f64> {
        self.nodes.lock().as_ref().map(|(_, gain)| gain.node.gain())
    }

    pub fn set_gain(&self, gain: f64) -> Result<()> {
        if (gain - 1.0).abs() < f64::EPSILON {
            self.remove_gain();
            return Ok(());
        }

        let mut nodes = self.nodes.lock();
        if let Some((_, leased)) = nodes.as_ref() {
            leased.node.set_gain(gain);
            return Ok(());
        }

        let graph = self
            .graph
            .as_ref()
            .filter(|graph| graph.is_available())
            .ok_or_else(|| ProviderError::Unsupported {
                library: "audio-gain".to_string(),
            })?;
        let source = graph.create_source(&self.element)?;
        let leased = graph.create_gain()?;
        source.node.connect(leased.node.as_ref());
        leased.node.connect_to_destination();
        leased.node.set_gain(gain);
        *nodes = Some((source, leased));
        Ok(())
    }

    pub fn remove_gain(&self) {
        let nodes = self.nodes.lock().take();
        if let Some((source, gain)) = nodes {
            source.release();
            gain.release();
        }
    }
}

impl Drop for AudioGainAdapter {
    fn drop(&mut self) {
        self.remove_gain();
    }
}
