use std::sync::Arc;

use half::f16;
use hashbrown::HashMap;
use jagged_error::Result;
use parking_lot::RwLock;
use tracing::debug;

use super::ArrayKernels;
use super::list_offset::ListOffsetKernels;
use super::primitive::PrimitiveKernels;
use crate::arrays::array::Array;
use crate::arrays::datatype::DataType;
use crate::arrays::primitive::NativePrimitive;

/// Cache of compiled kernels keyed by data type.
///
/// Primitive kernels are registered up front. Kernels for list-offset types
/// are compiled the first time the type is seen (along with kernels for any
/// nested content types), and reused for every later call with a structurally
/// equal type.
#[derive(Debug)]
pub struct KernelRegistry {
    kernels: RwLock<HashMap<DataType, Arc<dyn ArrayKernels>, ahash::RandomState>>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        let mut kernels: HashMap<DataType, Arc<dyn ArrayKernels>, ahash::RandomState> =
            HashMap::with_hasher(ahash::RandomState::new());

        fn register<T: NativePrimitive>(
            kernels: &mut HashMap<DataType, Arc<dyn ArrayKernels>, ahash::RandomState>,
        ) {
            kernels.insert(T::DATATYPE, Arc::new(PrimitiveKernels::<T>::new()));
        }

        register::<bool>(&mut kernels);
        register::<i8>(&mut kernels);
        register::<i16>(&mut kernels);
        register::<i32>(&mut kernels);
        register::<i64>(&mut kernels);
        register::<u8>(&mut kernels);
        register::<u16>(&mut kernels);
        register::<u32>(&mut kernels);
        register::<u64>(&mut kernels);
        register::<f16>(&mut kernels);
        register::<f32>(&mut kernels);
        register::<f64>(&mut kernels);

        KernelRegistry {
            kernels: RwLock::new(kernels),
        }
    }

    /// Get kernels for a type, compiling them if this is the first time the
    /// type has been requested.
    pub fn get_or_compile(&self, datatype: &DataType) -> Result<Arc<dyn ArrayKernels>> {
        if let Some(kernels) = self.kernels.read().get(datatype) {
            return Ok(kernels.clone());
        }

        let compiled: Arc<dyn ArrayKernels> = match datatype {
            DataType::ListOffset(content) => {
                let content = self.get_or_compile(content)?;
                Arc::new(ListOffsetKernels::new(content))
            }
            // All primitive kernels are registered on creation.
            other => jagged_error::not_implemented!("kernels for {other}"),
        };

        debug!(%datatype, "compiled kernels");

        // Another thread may have compiled the same type while we weren't
        // holding the lock. Keep whichever was inserted first.
        let mut kernels = self.kernels.write();
        let kernels = kernels
            .entry(datatype.clone())
            .or_insert(compiled)
            .clone();

        Ok(kernels)
    }

    /// Get kernels for the type of `array`.
    pub fn kernels_for(&self, array: &Array) -> Result<Arc<dyn ArrayKernels>> {
        self.get_or_compile(&array.datatype())
    }

    /// Check if kernels for a type have already been compiled.
    pub fn is_compiled(&self, datatype: &DataType) -> bool {
        self.kernels.read().contains_key(datatype)
    }

    /// Number of types with compiled kernels, including primitives.
    pub fn num_compiled(&self) -> usize {
        self.kernels.read().len()
    }
}

impl Default for KernelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
