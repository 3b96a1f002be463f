use jagged_error::Result;
use tracing::trace;

use super::Marshaler;
use crate::arrays::array::ArrayValue;
use crate::arrays::index::IndexExpr;
use crate::arrays::primitive::PrimitiveArray;
use crate::arrays::scalar::ScalarValue;
use crate::host::{Host, HostClass, HostValue};
use crate::kernels::registry::KernelRegistry;
use crate::kernels::{Attribute, Projection};

/// An operation invoked from the host on an array.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Len,
    /// Non-wrapping get by index.
    GetIndex(usize),
    /// Non-wrapping get by slice.
    GetSlice { start: usize, stop: usize },
    /// Host style indexing with wraparound and clamped ranges.
    GetItem(Vec<IndexExpr>),
    Project(Attribute),
}

impl<H> Marshaler<'_, H>
where
    H: Host + ?Sized,
{
    /// Run an operation on a host value through compiled kernels.
    ///
    /// The value is unboxed once, the operation runs entirely on the native
    /// array, and only the result is boxed back. Nothing acquired for the
    /// call outlives it except the returned host value.
    pub fn call(
        &self,
        registry: &KernelRegistry,
        value: &HostValue,
        op: &Operation,
    ) -> Result<HostValue> {
        let datatype = self.typeof_value(value)?;
        let kernels = registry.get_or_compile(&datatype)?;
        let array = self.unbox(&datatype, value)?;

        trace!(%datatype, ?op, "calling kernels");

        match op {
            Operation::Len => {
                let len = i64::try_from(kernels.len(&array)?)?;
                Ok(HostValue::Scalar(ScalarValue::Int64(len)))
            }
            Operation::GetIndex(idx) => self.box_value(&kernels.get_index(&array, *idx)?),
            Operation::GetSlice { start, stop } => {
                self.box_array(&kernels.get_slice(&array, *start, *stop)?)
            }
            Operation::GetItem(exprs) => self.box_value(&kernels.getitem(&array, exprs)?),
            Operation::Project(attr) => match kernels.project(&array, *attr)? {
                Projection::Offsets(offsets) => {
                    let offsets = self.host().new_array(PrimitiveArray::Int64(offsets))?;
                    self.host().construct(HostClass::Index, &[offsets])
                }
                Projection::Content(content) => self.box_array(&content),
                Projection::Identity(identity) => self.box_identity(identity.as_ref()),
            },
        }
    }

    /// Index into a host value, returning the native result without boxing
    /// it.
    pub fn getitem_native(
        &self,
        registry: &KernelRegistry,
        value: &HostValue,
        exprs: &[IndexExpr],
    ) -> Result<ArrayValue> {
        let datatype = self.typeof_value(value)?;
        let kernels = registry.get_or_compile(&datatype)?;
        let array = self.unbox(&datatype, value)?;
        kernels.getitem(&array, exprs)
    }
}
