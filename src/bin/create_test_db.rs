use std::path::Path;

use rusqlite::Connection;
use session_analytics::adapters::db::{
    NewSessionRecord, NewUserRecord, insert_session, insert_user, open_connection, run_migrations,
    schema_version,
};
use session_analytics::domain::models::DeviceType;

const DEMO_USERS: &[(&str, &str, bool)] = &[
    ("Ada", "Lovelace", false),
    ("Grace", "Hopper", false),
    ("Alan", "Turing", true),
];

/// (user index, device type, started_at_utc, ended_at_utc)
const DEMO_SESSIONS: &[(usize, DeviceType, &str, Option<&str>)] = &[
    (0, DeviceType::Desktop, "2023-11-02 08:00:00", Some("2023-11-02 09:30:00")),
    (0, DeviceType::Mobile, "2024-03-14 19:05:00", Some("2024-03-14 19:40:00")),
    (1, DeviceType::Desktop, "2023-10-30 07:45:00", Some("2023-10-30 12:00:00")),
    (1, DeviceType::Mobile, "2024-08-01 21:10:00", Some("2024-08-01 21:25:00")),
    (1, DeviceType::Mobile, "2025-02-10 10:00:00", None),
    (2, DeviceType::Mobile, "2024-05-20 13:00:00", Some("2024-05-20 14:00:00")),
];

fn main() {
    if let Err(error) = run() {
        eprintln!("failed to create test db: {error}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let mut path = if cfg!(windows) {
        ".\\data\\analytics_test.db".to_string()
    } else {
        "./data/analytics_test.db".to_string()
    };
    let mut force = false;
    let mut seed = false;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--path" => {
                let Some(value) = args.get(index + 1) else {
                    return Err("--path requires a value".to_string());
                };
                path = value.clone();
                index += 2;
            }
            "--force" => {
                force = true;
                index += 1;
            }
            "--seed" => {
                seed = true;
                index += 1;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => {
                return Err(format!("unknown argument: {other}"));
            }
        }
    }

    let path_ref = Path::new(&path);
    if let Some(parent) = path_ref.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|error| format!("failed to create parent directory: {error}"))?;
    }

    if force && path_ref.exists() {
        std::fs::remove_file(path_ref)
            .map_err(|error| format!("failed to remove existing db file: {error}"))?;
    }

    let mut connection = open_connection(&path).map_err(|error| error.to_string())?;
    run_migrations(&mut connection).map_err(|error| error.to_string())?;
    let version = schema_version(&connection).map_err(|error| error.to_string())?;

    println!("created/updated test db at: {path}");
    println!("schema version: {version}");

    if seed {
        let (users, sessions) = seed_demo_data(&mut connection)?;
        println!("seeded {users} users and {sessions} sessions");
    }

    Ok(())
}

fn seed_demo_data(connection: &mut Connection) -> Result<(usize, usize), String> {
    let transaction = connection
        .transaction()
        .map_err(|error| error.to_string())?;

    let mut user_ids = Vec::with_capacity(DEMO_USERS.len());
    for (first_name, last_name, deleted) in DEMO_USERS {
        let id = insert_user(
            &transaction,
            &NewUserRecord {
                first_name: (*first_name).to_string(),
                last_name: (*last_name).to_string(),
                deleted: *deleted,
            },
        )
        .map_err(|error| error.to_string())?;
        user_ids.push(id);
    }

    for (user_index, device_type, started_at_utc, ended_at_utc) in DEMO_SESSIONS {
        insert_session(
            &transaction,
            &NewSessionRecord {
                started_at_utc: (*started_at_utc).to_string(),
                ended_at_utc: ended_at_utc.map(ToString::to_string),
                device_type: device_type.code(),
                user_id: user_ids[*user_index],
            },
        )
        .map_err(|error| error.to_string())?;
    }

    transaction.commit().map_err(|error| error.to_string())?;
    Ok((DEMO_USERS.len(), DEMO_SESSIONS.len()))
}

fn print_help() {
    println!("create_test_db");
    println!();
    println!("Usage:");
    println!("  cargo run --bin create_test_db -- [--path <file>] [--force] [--seed]");
    println!();
    println!("Options:");
    println!(
        "  --path <file>   target sqlite file (default: .\\\\data\\\\analytics_test.db on Windows)"
    );
    println!("  --force         delete existing file before creating");
    println!("  --seed          insert a small demo set of users and sessions");
}
