// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Current codec context, replaced whole when the schema changes.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bindery_model::SchemaIndex;
use parking_lot::RwLock;
use tracing::info;

use crate::config::CodecConfig;
use crate::context::BindingCodecContext;
use crate::registry::ClassRegistry;

/// Holder of the codec context for the current schema generation.
///
/// Readers take an `Arc` snapshot and keep using it even if an update lands
/// meanwhile; an update never mutates a published context.
#[derive(Debug)]
pub struct BindingRuntime {
    classes: Arc<ClassRegistry>,
    config: CodecConfig,
    current: RwLock<Arc<BindingCodecContext>>,
    generation: AtomicU64,
}

impl BindingRuntime {
    /// Runtime starting at `schema`.
    pub fn new(schema: Arc<SchemaIndex>, classes: Arc<ClassRegistry>, config: CodecConfig) -> Self {
        let context = BindingCodecContext::with_config(schema, Arc::clone(&classes), config.clone());
        Self {
            classes,
            config,
            current: RwLock::new(Arc::new(context)),
            generation: AtomicU64::new(0),
        }
    }

    /// Snapshot of the current context.
    pub fn context(&self) -> Arc<BindingCodecContext> {
        Arc::clone(&self.current.read())
    }

    /// Installs a context for `schema` with an empty codec cache and returns
    /// the new generation.
    pub fn update(&self, schema: Arc<SchemaIndex>) -> u64 {
        let digest = schema.digest();
        let context = Arc::new(BindingCodecContext::with_config(
            schema,
            Arc::clone(&self.classes),
            self.config.clone(),
        ));
        let mut current = self.current.write();
        *current = context;
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        drop(current);
        info!(generation, digest = %digest, "installed codec context");
        generation
    }

    /// Number of updates applied so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}
