//! Database schema definitions

/// SQL to create the chunks table
pub const CREATE_CHUNKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    name TEXT NOT NULL,
    content TEXT NOT NULL,
    file_path TEXT NOT NULL,
    language TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    start_column INTEGER NOT NULL DEFAULT 0,
    end_column INTEGER NOT NULL DEFAULT 0,
    signature TEXT,
    documentation TEXT,
    dependencies TEXT NOT NULL DEFAULT '[]',
    metadata TEXT,
    timestamp INTEGER NOT NULL DEFAULT 0
)
"#;

/// SQL to create the embeddings table
pub const CREATE_EMBEDDINGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS embeddings (
    chunk_id TEXT PRIMARY KEY,
    vector BLOB NOT NULL
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_chunks_file ON chunks(file_path)",
    "CREATE INDEX IF NOT EXISTS idx_chunks_name ON chunks(name)",
    "CREATE INDEX IF NOT EXISTS idx_chunks_kind ON chunks(kind)",
    "CREATE INDEX IF NOT EXISTS idx_chunks_language ON chunks(language)",
];

/// Column list shared by every chunk SELECT
pub const CHUNK_COLUMNS: &str = "id, kind, name, content, file_path, language, start_line, end_line, \
     start_column, end_column, signature, documentation, dependencies, metadata, timestamp";

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![CREATE_CHUNKS_TABLE, CREATE_EMBEDDINGS_TABLE];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
