/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// A registered web property. Sites are identified by an opaque public
/// string token (embedded in the client snippet), not a database id.
pub type SiteId = String;

/// A stable, page-scoped token identifying one editable DOM node across
/// scans. Minted by the content scanner and written back onto the element.
pub type ElementId = String;
