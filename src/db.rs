use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

use crate::config::FingerprintSettings;
use crate::error::{Result, TagError};
use crate::hashing::FingerprintKey;
use crate::index::{FingerprintIndex, Occurrence, ReferenceId};

pub fn setup_database<P: AsRef<Path>>(db_path: P) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    create_schema(&conn)?;
    Ok(conn)
}

pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS settings (
            settings_id  INTEGER PRIMARY KEY AUTOINCREMENT,
            settings_key TEXT NOT NULL UNIQUE
        );
        CREATE TABLE IF NOT EXISTS songs (
            song_id     INTEGER PRIMARY KEY AUTOINCREMENT,
            settings_id INTEGER NOT NULL,
            ref_index   INTEGER NOT NULL,
            filepath    TEXT NOT NULL,
            FOREIGN KEY (settings_id) REFERENCES settings (settings_id)
        );
        CREATE TABLE IF NOT EXISTS fingerprints (
            hash        TEXT NOT NULL,
            ordinal     INTEGER NOT NULL,
            time_offset INTEGER NOT NULL,
            song_id     INTEGER NOT NULL,
            settings_id INTEGER NOT NULL,
            FOREIGN KEY (song_id) REFERENCES songs (song_id)
        );
        CREATE INDEX IF NOT EXISTS idx_fingerprints_settings ON fingerprints (settings_id);",
    )?;
    Ok(())
}

fn settings_id(conn: &Connection, settings_key: &str) -> Result<Option<i64>> {
    let mut stmt = conn.prepare_cached("SELECT settings_id FROM settings WHERE settings_key = ?1")?;
    Ok(stmt
        .query_row(params![settings_key], |row| row.get(0))
        .optional()?)
}

/// Stores `index` under its settings, replacing any earlier copy.
pub fn save_index(conn: &mut Connection, index: &FingerprintIndex) -> Result<()> {
    let settings_key = index.settings().canonical_key()?;
    let tx = conn.transaction()?;

    let settings_id = match settings_id(&tx, &settings_key)? {
        Some(id) => {
            tx.execute("DELETE FROM fingerprints WHERE settings_id = ?1", params![id])?;
            tx.execute("DELETE FROM songs WHERE settings_id = ?1", params![id])?;
            id
        }
        None => {
            tx.execute(
                "INSERT INTO settings (settings_key) VALUES (?1)",
                params![settings_key],
            )?;
            tx.last_insert_rowid()
        }
    };

    let mut song_ids = Vec::with_capacity(index.reference_count());
    {
        let mut stmt = tx.prepare(
            "INSERT INTO songs (settings_id, ref_index, filepath) VALUES (?1, ?2, ?3)",
        )?;
        for (id, name) in index.references() {
            stmt.execute(params![settings_id, id.as_u32() as i64, name])?;
            song_ids.push(tx.last_insert_rowid());
        }
    }

    {
        let mut stmt = tx.prepare(
            "INSERT INTO fingerprints (hash, ordinal, time_offset, song_id, settings_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for (key, occurrences) in index.entries() {
            let hash = serde_json::to_string(key)?;
            for (ordinal, occurrence) in occurrences.iter().enumerate() {
                let song_id = song_ids[occurrence.reference.as_u32() as usize];
                stmt.execute(params![
                    hash,
                    ordinal as i64,
                    occurrence.seq as i64,
                    song_id,
                    settings_id
                ])?;
            }
        }
    }

    tx.commit()?;
    log::info!(
        "Stored index: {} references, {} fingerprints",
        index.reference_count(),
        index.occurrence_count()
    );
    Ok(())
}

/// Loads the index stored for `settings`, if any.
pub fn load_index(
    conn: &Connection,
    settings: &FingerprintSettings,
) -> Result<Option<FingerprintIndex>> {
    let Some(settings_id) = settings_id(conn, &settings.canonical_key()?)? else {
        return Ok(None);
    };

    let mut index = FingerprintIndex::new(settings.clone());

    let mut stmt = conn.prepare_cached(
        "SELECT ref_index, filepath FROM songs WHERE settings_id = ?1 ORDER BY ref_index",
    )?;
    let songs = stmt.query_map(params![settings_id], |row| {
        Ok((row.get::<usize, i64>(0)?, row.get::<usize, String>(1)?))
    })?;
    for song in songs {
        let (ref_index, filepath) = song?;
        let id = index.add_reference(&filepath)?;
        if id.as_u32() as i64 != ref_index {
            return Err(TagError::Format(format!(
                "stored reference '{}' has index {}, expected {}",
                filepath,
                ref_index,
                id.as_u32()
            )));
        }
    }

    let mut stmt = conn.prepare_cached(
        "SELECT f.hash, s.ref_index, f.time_offset
         FROM fingerprints f JOIN songs s ON f.song_id = s.song_id
         WHERE f.settings_id = ?1
         ORDER BY f.hash, f.ordinal",
    )?;
    let rows = stmt.query_map(params![settings_id], |row| {
        Ok((
            row.get::<usize, String>(0)?,
            row.get::<usize, i64>(1)?,
            row.get::<usize, i64>(2)?,
        ))
    })?;
    for row in rows {
        let (hash, ref_index, time_offset) = row?;
        let key: FingerprintKey = serde_json::from_str(&hash)?;
        index.insert(
            key,
            Occurrence {
                reference: ReferenceId(ref_index as u32),
                seq: time_offset as usize,
            },
        );
    }

    log::info!(
        "Loaded stored index: {} references, {} fingerprints",
        index.reference_count(),
        index.occurrence_count()
    );
    Ok(Some(index))
}
