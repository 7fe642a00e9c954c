use crate::{
    foundation::core::{EntityId, FrameIndex, TypeId},
    foundation::error::AnnotrackResult,
};

/// Column name/value pairs of one stored row.
pub type Fields = serde_json::Map<String, serde_json::Value>;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
/// Logical tables of the persistence contract, one per entity kind.
pub enum Table {
    Type,
    Track,
    Point,
    Line,
    Rect,
    Ellipse,
    Polygon,
}

impl Table {
    pub const ALL: [Table; 7] = [
        Table::Type,
        Table::Track,
        Table::Point,
        Table::Line,
        Table::Rect,
        Table::Ellipse,
        Table::Polygon,
    ];

    /// Write order for inserts; deletes run in reverse.
    pub(crate) fn dependency_rank(self) -> u8 {
        match self {
            Table::Type => 0,
            Table::Track => 1,
            Table::Point | Table::Line | Table::Rect | Table::Ellipse | Table::Polygon => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// Equality filters on the referential columns; unset fields match everything.
pub struct RowFilter {
    pub frame: Option<FrameIndex>,
    pub type_id: Option<TypeId>,
    pub track: Option<EntityId>,
}

impl RowFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn frame(frame: FrameIndex) -> Self {
        Self {
            frame: Some(frame),
            ..Self::default()
        }
    }

    pub fn type_id(type_id: TypeId) -> Self {
        Self {
            type_id: Some(type_id),
            ..Self::default()
        }
    }

    pub fn track(track: EntityId) -> Self {
        Self {
            track: Some(track),
            ..Self::default()
        }
    }

    /// Whether a row's columns satisfy every set filter.
    pub fn matches(&self, fields: &Fields) -> bool {
        fn column_is(fields: &Fields, key: &str, want: Option<u64>) -> bool {
            match want {
                None => true,
                Some(v) => fields.get(key).and_then(serde_json::Value::as_u64) == Some(v),
            }
        }

        column_is(fields, "frame", self.frame.map(|f| f.0))
            && column_is(fields, "type", self.type_id.map(|t| t.0))
            && column_is(fields, "track", self.track.map(|t| t.0))
    }
}

/// Storage collaborator. The engine only issues the operations below.
pub trait PersistenceBackend {
    /// Insert a new row. Inserting an existing id is an error.
    fn insert(&mut self, table: Table, id: u64, fields: &Fields) -> AnnotrackResult<()>;

    /// Overwrite the given columns of an existing row.
    fn update(&mut self, table: Table, id: u64, fields: &Fields) -> AnnotrackResult<()>;

    fn delete(&mut self, table: Table, id: u64) -> AnnotrackResult<()>;

    /// Rows of `table` matching `filter`, in ascending id order.
    fn query(&self, table: Table, filter: &RowFilter) -> AnnotrackResult<Vec<(u64, Fields)>>;
}
