use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::core::RowKey;
use crate::error::{ChartError, ChartResult};
use crate::indicators::{IndicatorKernel, IndicatorParams};

use super::mapping::TableMapping;
use super::row::{Column, TableRow};
use super::storage::TableStorage;
use super::table::{MappingId, Table};

/// Handle of a computer registered on a [`Table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComputerId(pub(crate) usize);

impl ComputerId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

type InputSlots = SmallVec<[(&'static str, Option<Column>); 4]>;
type OutputSlots = SmallVec<[(&'static str, usize); 4]>;

/// Drives one indicator kernel over the rows of a storage.
///
/// Inputs are read through the bound mapping as registered on the table at
/// run time; outputs land in computed columns allocated when the computer
/// was created.
#[derive(Debug)]
pub struct TableComputer {
    id: ComputerId,
    mapping: MappingId,
    kernel: Box<dyn IndicatorKernel>,
    outputs: OutputSlots,
}

impl TableComputer {
    /// Registers `kernel` over `mapping` on `table`. See [`Table::create_computer`].
    pub fn bind(
        table: &mut Table,
        mapping: &TableMapping,
        kernel: Box<dyn IndicatorKernel>,
    ) -> ChartResult<ComputerId> {
        table.create_computer(mapping, kernel, None)
    }

    pub(crate) fn new(
        id: ComputerId,
        mapping: MappingId,
        kernel: Box<dyn IndicatorKernel>,
        outputs: OutputSlots,
    ) -> Self {
        Self {
            id,
            mapping,
            kernel,
            outputs,
        }
    }

    #[must_use]
    pub fn id(&self) -> ComputerId {
        self.id
    }

    #[must_use]
    pub fn kernel(&self) -> &dyn IndicatorKernel {
        self.kernel.as_ref()
    }

    #[must_use]
    pub fn mapping_id(&self) -> MappingId {
        self.mapping
    }

    #[must_use]
    pub fn output_column(&self, name: &str) -> Option<Column> {
        self.outputs
            .iter()
            .find(|(output, _)| *output == name)
            .map(|(_, column)| Column::Computed(*column))
    }

    pub fn output_columns(&self) -> impl Iterator<Item = (&'static str, Column)> + '_ {
        self.outputs
            .iter()
            .map(|(name, column)| (*name, Column::Computed(*column)))
    }

    pub(crate) fn reinit(&mut self, params: &IndicatorParams) -> ChartResult<()> {
        self.kernel.reinit(params)
    }

    /// Restarts the kernel and streams every row of `storage` through it.
    ///
    /// Stops at the first failing row; rows before it keep their new outputs.
    pub(crate) fn run_on(
        &mut self,
        storage: &mut TableStorage,
        mapping: &TableMapping,
    ) -> ChartResult<()> {
        let aggregated = storage.is_aggregated();
        let inputs: InputSlots = self
            .kernel
            .input_fields()
            .iter()
            .map(|name| (*name, mapping.column(name, aggregated).ok()))
            .collect();
        let width = self
            .outputs
            .iter()
            .map(|(_, column)| column + 1)
            .max()
            .unwrap_or(0);

        self.kernel.start();
        let rows = storage.rows_mut();
        trace!(
            computer = self.id.0,
            indicator = self.kernel.name(),
            aggregated,
            rows_count = rows.len(),
            "run table computer"
        );
        for row in rows.iter_mut() {
            row.ensure_computed(width);
            let key = row.key;
            let mut proxy = RowProxy::new(row, &inputs, &self.outputs);
            proxy.clear_outputs();
            self.kernel
                .calculate(&mut proxy)
                .map_err(|source| ChartError::Computation {
                    key,
                    indicator: self.kernel.name().to_owned(),
                    source: Box::new(source),
                })?;
        }
        debug!(
            computer = self.id.0,
            indicator = self.kernel.name(),
            rows_count = rows.len(),
            "table computer finished"
        );
        Ok(())
    }
}

/// Row handed to a kernel: declared inputs and outputs by slot or by name.
///
/// Slots follow the order of the kernel's `input_fields` and `output_fields`.
#[derive(Debug)]
pub struct RowProxy<'a> {
    row: &'a mut TableRow,
    inputs: &'a [(&'static str, Option<Column>)],
    outputs: &'a [(&'static str, usize)],
}

impl<'a> RowProxy<'a> {
    pub(crate) fn new(
        row: &'a mut TableRow,
        inputs: &'a [(&'static str, Option<Column>)],
        outputs: &'a [(&'static str, usize)],
    ) -> Self {
        Self {
            row,
            inputs,
            outputs,
        }
    }

    #[must_use]
    pub fn key(&self) -> RowKey {
        self.row.key
    }

    /// Value of input `slot`. Fails when the field has no column in the mapping.
    pub fn input(&self, slot: usize) -> ChartResult<f64> {
        let (name, column) = self.inputs.get(slot).ok_or(ChartError::IndexOutOfRange {
            index: slot as isize,
            len: self.inputs.len(),
        })?;
        column
            .map(|column| self.row.column(column))
            .ok_or_else(|| ChartError::MappingBinding {
                field: (*name).to_owned(),
            })
    }

    pub fn set_output(&mut self, slot: usize, value: f64) -> ChartResult<()> {
        let (_, column) = self.outputs.get(slot).ok_or(ChartError::IndexOutOfRange {
            index: slot as isize,
            len: self.outputs.len(),
        })?;
        self.row.set_computed(*column, value);
        Ok(())
    }

    /// Reads a declared input or output by name.
    pub fn get(&self, name: &str) -> ChartResult<f64> {
        if let Some(slot) = self.inputs.iter().position(|(input, _)| *input == name) {
            return self.input(slot);
        }
        self.outputs
            .iter()
            .find(|(output, _)| *output == name)
            .map(|(_, column)| self.row.computed(*column))
            .ok_or_else(|| ChartError::MappingBinding {
                field: name.to_owned(),
            })
    }

    /// Writes a declared output by name.
    pub fn set(&mut self, name: &str, value: f64) -> ChartResult<()> {
        let slot = self
            .outputs
            .iter()
            .position(|(output, _)| *output == name)
            .ok_or_else(|| ChartError::MappingBinding {
                field: name.to_owned(),
            })?;
        self.set_output(slot, value)
    }

    fn clear_outputs(&mut self) {
        for (_, column) in self.outputs {
            self.row.set_computed(*column, f64::NAN);
        }
    }
}
