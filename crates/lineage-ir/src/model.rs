//! IR node definitions.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::IrError;

/// Free-form operation parameters, in declaration order.
pub type Params = IndexMap<String, Value>;

/// Declared column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Integer,
    Date,
    /// Provenance could not be inferred by the extractor.
    Unknown,
}

impl ColumnType {
    pub const ALL: [ColumnType; 4] = [
        ColumnType::String,
        ColumnType::Integer,
        ColumnType::Date,
        ColumnType::Unknown,
    ];

    /// The persisted name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Integer => "integer",
            ColumnType::Date => "date",
            ColumnType::Unknown => "unknown",
        }
    }
}

impl FromStr for ColumnType {
    type Err = IrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ColumnType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| IrError::UnknownColumnType(s.to_string()))
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, typed column of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A dataset flowing between operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    /// Provenance tag, opaque to the optimizer.
    pub source: String,
    #[serde(default)]
    pub columns: Vec<Column>,
}

impl Dataset {
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, ty: ColumnType) -> Self {
        self.columns.push(Column::new(name, ty));
        self
    }
}

/// Operation type tags, as they appear in the persisted IR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpType {
    #[serde(rename = "load_csv")]
    Load,
    #[serde(rename = "save_binary")]
    Save,
    #[serde(rename = "compute_columns")]
    Compute,
    #[serde(rename = "filter_rows")]
    Filter,
    #[serde(rename = "aggregate")]
    Aggregate,
    #[serde(rename = "join")]
    Join,
    #[serde(rename = "sort")]
    Sort,
    #[serde(rename = "generic_transform")]
    Generic,
    #[serde(rename = "materialize")]
    Materialize,
    #[serde(rename = "batch_compute")]
    BatchCompute,
}

impl OpType {
    pub const ALL: [OpType; 10] = [
        OpType::Load,
        OpType::Save,
        OpType::Compute,
        OpType::Filter,
        OpType::Aggregate,
        OpType::Join,
        OpType::Sort,
        OpType::Generic,
        OpType::Materialize,
        OpType::BatchCompute,
    ];

    /// The persisted name of this tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpType::Load => "load_csv",
            OpType::Save => "save_binary",
            OpType::Compute => "compute_columns",
            OpType::Filter => "filter_rows",
            OpType::Aggregate => "aggregate",
            OpType::Join => "join",
            OpType::Sort => "sort",
            OpType::Generic => "generic_transform",
            OpType::Materialize => "materialize",
            OpType::BatchCompute => "batch_compute",
        }
    }

    /// Upper-case label used in diagrams and logs.
    pub fn label(&self) -> &'static str {
        match self {
            OpType::Load => "LOAD_CSV",
            OpType::Save => "SAVE_BINARY",
            OpType::Compute => "COMPUTE",
            OpType::Filter => "FILTER",
            OpType::Aggregate => "AGGREGATE",
            OpType::Join => "JOIN",
            OpType::Sort => "SORT",
            OpType::Generic => "GENERIC",
            OpType::Materialize => "MATERIALIZE",
            OpType::BatchCompute => "BATCH_COMPUTE",
        }
    }
}

impl FromStr for OpType {
    type Err = IrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OpType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| IrError::UnknownOpType(s.to_string()))
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of an elementwise compute operation.
///
/// Every payload keeps the parameter map exactly as declared, so values and
/// key order survive a load and dump even when a named field holds a number.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComputeParams {
    params: Params,
}

impl ComputeParams {
    pub fn new(target: impl Into<String>, expression: impl Into<String>) -> Self {
        let mut params = Params::new();
        params.insert("target".to_string(), Value::String(target.into()));
        params.insert("expression".to_string(), Value::String(expression.into()));
        Self { params }
    }

    /// Column written by the expression.
    pub fn target(&self) -> Option<Cow<'_, str>> {
        text(&self.params, "target")
    }

    /// The expression, or an empty string when none was declared.
    pub fn expression(&self) -> Cow<'_, str> {
        text(&self.params, "expression").unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    fn from_params(params: Params) -> Self {
        Self { params }
    }

    pub fn to_params(&self) -> Params {
        self.params.clone()
    }
}

/// Parameters of a row filter.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterParams {
    params: Params,
}

impl FilterParams {
    pub fn new(condition: impl Into<String>) -> Self {
        let mut params = Params::new();
        params.insert("condition".to_string(), Value::String(condition.into()));
        Self { params }
    }

    pub fn condition(&self) -> Option<Cow<'_, str>> {
        text(&self.params, "condition")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    fn from_params(params: Params) -> Self {
        Self { params }
    }

    pub fn to_params(&self) -> Params {
        self.params.clone()
    }
}

/// Parameters of a sort.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SortParams {
    params: Params,
}

impl SortParams {
    pub fn new(keys: impl Into<String>) -> Self {
        let mut params = Params::new();
        params.insert("keys".to_string(), Value::String(keys.into()));
        Self { params }
    }

    pub fn keys(&self) -> Option<Cow<'_, str>> {
        text(&self.params, "keys")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    fn from_params(params: Params) -> Self {
        Self { params }
    }

    pub fn to_params(&self) -> Params {
        self.params.clone()
    }
}

/// Parameters of an un-promoted trace command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenericParams {
    params: Params,
}

impl GenericParams {
    pub fn new(command: impl Into<String>) -> Self {
        let mut params = Params::new();
        params.insert("command".to_string(), Value::String(command.into()));
        Self { params }
    }

    pub fn with_args(mut self, args: impl Into<String>) -> Self {
        self.params.insert("args".to_string(), Value::String(args.into()));
        self
    }

    pub fn with_raw_content(mut self, raw: impl Into<String>) -> Self {
        self.params
            .insert("raw_content".to_string(), Value::String(raw.into()));
        self
    }

    pub fn command(&self) -> Option<Cow<'_, str>> {
        text(&self.params, "command")
    }

    pub fn args(&self) -> Option<Cow<'_, str>> {
        text(&self.params, "args")
    }

    /// The command's source text as captured by the extractor.
    pub fn raw_content(&self) -> Option<Cow<'_, str>> {
        text(&self.params, "raw_content")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    fn from_params(params: Params) -> Self {
        Self { params }
    }

    pub fn to_params(&self) -> Params {
        self.params.clone()
    }
}

/// Parameters of a batch of merged compute operations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchParams {
    /// Parameters of each merged compute, in original order.
    pub computes: Vec<ComputeParams>,
    /// Every other key, in declared order.
    pub extra: Params,
    /// Index of the `computes` key among the declared keys.
    position: usize,
}

impl BatchParams {
    pub fn new(computes: Vec<ComputeParams>) -> Self {
        Self {
            computes,
            extra: Params::new(),
            position: 0,
        }
    }

    fn from_params(mut params: Params) -> Self {
        let position = params.get_index_of("computes").unwrap_or(0);
        let computes = match params.get("computes") {
            Some(Value::Array(items)) if items.iter().all(Value::is_object) => {
                let computes = items
                    .iter()
                    .filter_map(|item| item.as_object())
                    .map(|map| {
                        let inner: Params =
                            map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                        ComputeParams::from_params(inner)
                    })
                    .collect();
                params.shift_remove("computes");
                computes
            }
            _ => Vec::new(),
        };
        Self {
            computes,
            extra: params,
            position,
        }
    }

    pub fn to_params(&self) -> Params {
        let mut params = self.extra.clone();
        // A malformed list was left in `extra` untouched.
        if params.contains_key("computes") {
            return params;
        }
        let computes = self
            .computes
            .iter()
            .map(|c| Value::Object(c.to_params().into_iter().collect()))
            .collect();
        let index = self.position.min(params.len());
        params.shift_insert(index, "computes".to_string(), Value::Array(computes));
        params
    }
}

/// The kind of an operation together with its typed parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum OpKind {
    Load(Params),
    Save(Params),
    Compute(ComputeParams),
    Filter(FilterParams),
    Aggregate(Params),
    Join(Params),
    Sort(SortParams),
    Generic(GenericParams),
    Materialize(Params),
    BatchCompute(BatchParams),
}

impl OpKind {
    /// Build a kind from its tag and a free-form parameter map.
    pub fn from_parts(op_type: OpType, params: Params) -> Self {
        match op_type {
            OpType::Load => OpKind::Load(params),
            OpType::Save => OpKind::Save(params),
            OpType::Compute => OpKind::Compute(ComputeParams::from_params(params)),
            OpType::Filter => OpKind::Filter(FilterParams::from_params(params)),
            OpType::Aggregate => OpKind::Aggregate(params),
            OpType::Join => OpKind::Join(params),
            OpType::Sort => OpKind::Sort(SortParams::from_params(params)),
            OpType::Generic => OpKind::Generic(GenericParams::from_params(params)),
            OpType::Materialize => OpKind::Materialize(params),
            OpType::BatchCompute => OpKind::BatchCompute(BatchParams::from_params(params)),
        }
    }

    pub fn op_type(&self) -> OpType {
        match self {
            OpKind::Load(_) => OpType::Load,
            OpKind::Save(_) => OpType::Save,
            OpKind::Compute(_) => OpType::Compute,
            OpKind::Filter(_) => OpType::Filter,
            OpKind::Aggregate(_) => OpType::Aggregate,
            OpKind::Join(_) => OpType::Join,
            OpKind::Sort(_) => OpType::Sort,
            OpKind::Generic(_) => OpType::Generic,
            OpKind::Materialize(_) => OpType::Materialize,
            OpKind::BatchCompute(_) => OpType::BatchCompute,
        }
    }

    /// Flatten the payload back into the persisted parameter map.
    pub fn to_params(&self) -> Params {
        match self {
            OpKind::Load(params)
            | OpKind::Save(params)
            | OpKind::Aggregate(params)
            | OpKind::Join(params)
            | OpKind::Materialize(params) => params.clone(),
            OpKind::Compute(params) => params.to_params(),
            OpKind::Filter(params) => params.to_params(),
            OpKind::Sort(params) => params.to_params(),
            OpKind::Generic(params) => params.to_params(),
            OpKind::BatchCompute(params) => params.to_params(),
        }
    }
}

/// A single step of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawOperation", into = "RawOperation")]
pub struct Operation {
    pub id: String,
    pub kind: OpKind,
    /// Consumed dataset ids, in declared order.
    pub inputs: Vec<String>,
    /// Produced dataset ids, in declared order.
    pub outputs: Vec<String>,
}

impl Operation {
    pub fn op_type(&self) -> OpType {
        self.kind.op_type()
    }

    pub fn is_compute(&self) -> bool {
        matches!(self.kind, OpKind::Compute(_))
    }

    /// The persisted parameter map of this operation.
    pub fn parameters(&self) -> Params {
        self.kind.to_params()
    }
}

#[derive(Serialize, Deserialize)]
struct RawOperation {
    id: String,
    #[serde(rename = "type")]
    op_type: OpType,
    #[serde(default)]
    inputs: Vec<String>,
    #[serde(default)]
    outputs: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    parameters: Params,
}

impl From<RawOperation> for Operation {
    fn from(raw: RawOperation) -> Self {
        Self {
            id: raw.id,
            kind: OpKind::from_parts(raw.op_type, raw.parameters),
            inputs: raw.inputs,
            outputs: raw.outputs,
        }
    }
}

impl From<Operation> for RawOperation {
    fn from(op: Operation) -> Self {
        Self {
            op_type: op.op_type(),
            parameters: op.parameters(),
            id: op.id,
            inputs: op.inputs,
            outputs: op.outputs,
        }
    }
}

/// A complete pipeline: datasets plus operations in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPipeline")]
pub struct Pipeline {
    metadata: IndexMap<String, String>,
    datasets: Vec<Dataset>,
    operations: Vec<Operation>,
}

impl Pipeline {
    /// Create a pipeline, rejecting duplicate operation or dataset ids.
    pub fn new(
        metadata: IndexMap<String, String>,
        datasets: Vec<Dataset>,
        operations: Vec<Operation>,
    ) -> Result<Self, IrError> {
        let mut seen = HashSet::new();
        for ds in &datasets {
            if !seen.insert(ds.id.as_str()) {
                return Err(IrError::DuplicateDataset(ds.id.clone()));
            }
        }
        seen.clear();
        for op in &operations {
            if !seen.insert(op.id.as_str()) {
                return Err(IrError::DuplicateOperation(op.id.clone()));
            }
        }
        Ok(Self::from_parts(metadata, datasets, operations))
    }

    /// Assemble a pipeline without re-checking id uniqueness.
    ///
    /// Used by passes to rebuild their output. A pass may introduce a
    /// clashing id (a batch named after its first member), which topology
    /// validation reports.
    pub fn from_parts(
        metadata: IndexMap<String, String>,
        datasets: Vec<Dataset>,
        operations: Vec<Operation>,
    ) -> Self {
        Self {
            metadata,
            datasets,
            operations,
        }
    }

    pub fn metadata(&self) -> &IndexMap<String, String> {
        &self.metadata
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn dataset(&self, id: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|ds| ds.id == id)
    }

    pub fn operation(&self, id: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.id == id)
    }

    pub fn into_parts(self) -> (IndexMap<String, String>, Vec<Dataset>, Vec<Operation>) {
        (self.metadata, self.datasets, self.operations)
    }
}

#[derive(Deserialize)]
struct RawPipeline {
    #[serde(default, deserialize_with = "null_as_default")]
    metadata: IndexMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    datasets: Vec<Dataset>,
    #[serde(default, deserialize_with = "null_as_default")]
    operations: Vec<Operation>,
}

impl TryFrom<RawPipeline> for Pipeline {
    type Error = IrError;

    fn try_from(raw: RawPipeline) -> Result<Self, Self::Error> {
        Pipeline::new(raw.metadata, raw.datasets, raw.operations)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn text<'a>(params: &'a Params, key: &str) -> Option<Cow<'a, str>> {
    match params.get(key)? {
        Value::String(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map.into_iter().collect(),
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_op_type_parses_persisted_names() {
        assert_eq!("compute_columns".parse::<OpType>().unwrap(), OpType::Compute);
        assert_eq!("batch_compute".parse::<OpType>().unwrap(), OpType::BatchCompute);
        assert_eq!("load_csv".parse::<OpType>().unwrap(), OpType::Load);
    }

    #[test]
    fn test_op_type_rejects_unknown_name() {
        let err = "magic_wand_transform".parse::<OpType>().unwrap_err();
        assert_eq!(err, IrError::UnknownOpType("magic_wand_transform".to_string()));
    }

    #[test]
    fn test_column_type_rejects_unknown_name() {
        assert!("quantum_state".parse::<ColumnType>().is_err());
        assert_eq!("unknown".parse::<ColumnType>().unwrap(), ColumnType::Unknown);
    }

    #[test]
    fn test_compute_params_keep_unnamed_keys() {
        let kind = OpKind::from_parts(
            OpType::Compute,
            params(json!({"target": "bonus", "expression": "age * 2", "logic": "recode"})),
        );
        match &kind {
            OpKind::Compute(p) => {
                assert_eq!(p.target().as_deref(), Some("bonus"));
                assert_eq!(p.expression(), "age * 2");
                assert_eq!(p.get("logic"), Some(&json!("recode")));
            }
            other => panic!("expected compute, got {:?}", other),
        }
        let flat = kind.to_params();
        assert_eq!(flat.get("target"), Some(&json!("bonus")));
        assert_eq!(flat.get("logic"), Some(&json!("recode")));
    }

    #[test]
    fn test_numeric_expression_is_read_as_text() {
        let kind = OpKind::from_parts(OpType::Compute, params(json!({"expression": 1})));
        match kind {
            OpKind::Compute(p) => {
                assert_eq!(p.expression(), "1");
                assert_eq!(p.to_params().get("expression"), Some(&json!(1)));
            }
            other => panic!("expected compute, got {:?}", other),
        }
    }

    #[test]
    fn test_generic_params_keep_values_and_order() {
        let declared = params(json!({"raw_content": "DISPLAY.", "args": 5, "command": "DISPLAY"}));
        let kind = OpKind::from_parts(OpType::Generic, declared);
        match &kind {
            OpKind::Generic(p) => {
                assert_eq!(p.command().as_deref(), Some("DISPLAY"));
                assert_eq!(p.args().as_deref(), Some("5"));
            }
            other => panic!("expected generic, got {:?}", other),
        }
        let flat = kind.to_params();
        let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["raw_content", "args", "command"]);
        assert_eq!(flat.get("args"), Some(&json!(5)));
    }

    #[test]
    fn test_batch_params_keep_computes_position() {
        let declared = params(json!({
            "note": "merged",
            "computes": [{"expression": "1", "target": "x"}],
            "origin": 3
        }));
        let flat = OpKind::from_parts(OpType::BatchCompute, declared).to_params();
        let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["note", "computes", "origin"]);
    }

    #[test]
    fn test_batch_params_read_computes_list() {
        let kind = OpKind::from_parts(
            OpType::BatchCompute,
            params(json!({"computes": [
                {"target": "x", "expression": "1"},
                {"target": "y", "expression": "x + 1"}
            ]})),
        );
        match kind {
            OpKind::BatchCompute(batch) => {
                assert_eq!(batch.computes.len(), 2);
                assert_eq!(batch.computes[1], ComputeParams::new("y", "x + 1"));
            }
            other => panic!("expected batch, got {:?}", other),
        }
    }

    #[test]
    fn test_pipeline_rejects_duplicate_ids() {
        let ds = vec![Dataset::new("ds1", "file"), Dataset::new("ds1", "file")];
        let err = Pipeline::new(IndexMap::new(), ds, vec![]).unwrap_err();
        assert_eq!(err, IrError::DuplicateDataset("ds1".to_string()));

        let op = Operation {
            id: "op1".to_string(),
            kind: OpKind::Load(Params::new()),
            inputs: vec![],
            outputs: vec![],
        };
        let err = Pipeline::new(IndexMap::new(), vec![], vec![op.clone(), op]).unwrap_err();
        assert_eq!(err, IrError::DuplicateOperation("op1".to_string()));
    }
}
