//! Tests against a running Firebird server.
//!
//! All of them are ignored by default. Run them with
//! `cargo test --test live_tests -- --ignored` after pointing `FB_HOST`,
//! `FB_PORT`, `FB_USER` and `FB_PASSWORD` at a server that can write
//! files under `FBMETA_LIVE_DIR` (the system temp dir when unset). The
//! server has to see the same file system, so use a local one.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use fbmeta::script::digest_tree;
use fbmeta::{
    build_database, export_database, update_database, Error, FirebirdConnector, ServerSettings,
};
use tempfile::TempDir;

fn settings() -> ServerSettings {
    dotenv::dotenv().ok();
    ServerSettings::from_env().unwrap()
}

/// A directory both this process and the server can write to
fn shared_dir() -> TempDir {
    let base = env::var("FBMETA_LIVE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir());
    let dir = tempfile::Builder::new()
        .prefix("fbmeta-live")
        .tempdir_in(base)
        .unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir.path(), fs::Permissions::from_mode(0o777)).unwrap();
    }
    dir
}

fn write_tree(root: &Path, files: BTreeMap<&str, &str>) {
    for (relative, sql) in files {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, sql).unwrap();
    }
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path).unwrap().next().is_none()
}

// =============================================================================
// update-db
// =============================================================================

#[test]
#[ignore = "needs a Firebird server"]
fn test_live_update_rolls_back_every_statement() {
    let settings = settings();
    let workspace = shared_dir();
    let empty = workspace.path().join("empty");
    fs::create_dir_all(&empty).unwrap();
    let report = build_database(&FirebirdConnector, &settings, workspace.path(), &empty).unwrap();
    let conn = settings.connection_for(&report.database).unwrap();

    let scripts = workspace.path().join("update");
    write_tree(
        &scripts,
        maplit::btreemap! {
            "domains/domain_DOM_CODE.sql" => "CREATE DOMAIN DOM_CODE AS VARCHAR(10);\n",
            "tables/A.sql" => "CREATE TABLE A (ID INTEGER)",
            "tables/B.sql" => "CREATE TABLE B (ID NO_SUCH_TYPE)",
        },
    );

    let err = update_database(&FirebirdConnector, &conn, &scripts).unwrap_err();
    assert!(
        matches!(err, Error::ScriptExecution { ref path, .. } if path.ends_with("tables/B.sql")),
        "{:?}",
        err
    );

    // a fresh connection sees neither the domain nor table A
    let exported = workspace.path().join("after");
    let after = export_database(&FirebirdConnector, &conn, &exported).unwrap();
    assert_eq!((after.domains, after.tables, after.procedures), (0, 0, 0));
    assert!(is_empty_dir(&exported.join("domains")));
    assert!(is_empty_dir(&exported.join("tables")));
}

#[test]
#[ignore = "needs a Firebird server"]
fn test_live_update_commits_on_success() {
    let settings = settings();
    let workspace = shared_dir();
    let empty = workspace.path().join("empty");
    fs::create_dir_all(&empty).unwrap();
    let report = build_database(&FirebirdConnector, &settings, workspace.path(), &empty).unwrap();
    let conn = settings.connection_for(&report.database).unwrap();

    let scripts = workspace.path().join("update");
    write_tree(
        &scripts,
        maplit::btreemap! {
            "domains/domain_DOM_CODE.sql" => "CREATE DOMAIN DOM_CODE AS VARCHAR(10);\n",
            "tables/A.sql" => "CREATE TABLE A (ID INTEGER)",
        },
    );

    let report = update_database(&FirebirdConnector, &conn, &scripts).unwrap();
    assert_eq!(report.executed, 2);

    let exported = workspace.path().join("after");
    let after = export_database(&FirebirdConnector, &conn, &exported).unwrap();
    assert_eq!((after.domains, after.tables), (1, 1));
}

// =============================================================================
// export-scripts / build-db
// =============================================================================

#[test]
#[ignore = "needs a Firebird server"]
fn test_live_export_build_export_is_stable() {
    let settings = settings();
    let workspace = shared_dir();

    let source = workspace.path().join("source");
    write_tree(
        &source,
        maplit::btreemap! {
            "domains/domain_DOM_ID.sql" => "CREATE DOMAIN DOM_ID AS INTEGER NOT NULL;\n",
            "domains/domain_DOM_NAME.sql" =>
                "CREATE DOMAIN DOM_NAME AS VARCHAR(50) CHARACTER SET UTF8 DEFAULT 'none' CHECK (VALUE <> '');\n",
            "tables/CUSTOMER.sql" =>
                "CREATE TABLE CUSTOMER (\n    ID DOM_ID,\n    NAME DOM_NAME,\n    BALANCE NUMERIC(12,2),\n    NOTE BLOB SUB_TYPE TEXT\n)",
            "procedures/procedure_GET_NAME.sql" =>
                "CREATE PROCEDURE GET_NAME (ID INTEGER)\nRETURNS (NAME VARCHAR(50))\nAS\nBEGIN\n  SELECT NAME FROM CUSTOMER WHERE ID = :ID INTO :NAME;\n  SUSPEND;\nEND",
        },
    );

    let first_db = workspace.path().join("first");
    let first = build_database(&FirebirdConnector, &settings, &first_db, &source).unwrap();
    let first_conn = settings.connection_for(&first.database).unwrap();
    let first_export = workspace.path().join("first_export");
    let exported = export_database(&FirebirdConnector, &first_conn, &first_export).unwrap();
    assert_eq!((exported.domains, exported.tables, exported.procedures), (2, 1, 1));

    let second_db = workspace.path().join("second");
    let second = build_database(&FirebirdConnector, &settings, &second_db, &first_export).unwrap();
    let second_conn = settings.connection_for(&second.database).unwrap();
    let second_export = workspace.path().join("second_export");
    let reexported = export_database(&FirebirdConnector, &second_conn, &second_export).unwrap();

    assert_eq!(exported.digest, reexported.digest);
    assert_eq!(digest_tree(&first_export).unwrap(), digest_tree(&second_export).unwrap());
}
