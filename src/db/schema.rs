pub const SCHEMA: &str = r#"
-- Clients: one per (identity, site)
CREATE TABLE IF NOT EXISTS client (
    id INTEGER PRIMARY KEY,
    orig_id INTEGER NOT NULL,
    gender TEXT NOT NULL,
    sgroup TEXT NOT NULL,       -- 'world', 'dev' or 'eval' (group is an SQL keyword)
    institute TEXT NOT NULL,
    UNIQUE (orig_id, institute)
);

-- Files: one per catalogued recording
CREATE TABLE IF NOT EXISTS file (
    id INTEGER PRIMARY KEY,
    path TEXT NOT NULL UNIQUE,
    client_id INTEGER NOT NULL,
    session INTEGER NOT NULL,
    device TEXT NOT NULL,
    modality TEXT NOT NULL,
    camera TEXT NOT NULL,
    recording TEXT NOT NULL,    -- 'video' or 'photo'
    nrecording INTEGER NOT NULL,

    -- Speech dialect only
    speech_type TEXT,
    environment TEXT,
    channel TEXT,

    FOREIGN KEY (client_id) REFERENCES client(id)
);

CREATE INDEX IF NOT EXISTS idx_file_client ON file(client_id);

-- Protocols
CREATE TABLE IF NOT EXISTS protocol (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    gender TEXT,
    probe_policy TEXT NOT NULL
);

-- Protocol purposes: (protocol, group, purpose)
CREATE TABLE IF NOT EXISTS protocol_purpose (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    protocol_id INTEGER NOT NULL,
    sgroup TEXT NOT NULL,
    purpose TEXT NOT NULL,
    UNIQUE (protocol_id, sgroup, purpose),
    FOREIGN KEY (protocol_id) REFERENCES protocol(id) ON DELETE CASCADE
);

-- Protocol purpose to file mapping
CREATE TABLE IF NOT EXISTS protocol_purpose_file (
    protocol_purpose_id INTEGER NOT NULL,
    file_id INTEGER NOT NULL,
    PRIMARY KEY (protocol_purpose_id, file_id),
    FOREIGN KEY (protocol_purpose_id) REFERENCES protocol_purpose(id) ON DELETE CASCADE,
    FOREIGN KEY (file_id) REFERENCES file(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_protocol_purpose_file_file ON protocol_purpose_file(file_id);
"#;
