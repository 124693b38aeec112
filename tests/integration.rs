//! End-to-end suite over the user-service fixture: the scenario walkthrough
//! (symbol search, caller/callee lookup, path finding, dead code, incremental
//! updates) plus the store-level consistency properties. CLI coverage rides on
//! two subprocess smoke tests; every other test drives the library facade the
//! binary is a thin shell around.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tempfile::TempDir;

use code_atlas::graph::build::lower_file;
use code_atlas::parser::parse_source;
use code_atlas::{
    AtlasConfig, CodeAtlas, EdgeKind, GraphStore, LanguageKind, SymbolKind, TraceDirection,
};

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

const USER_SERVICE_TS: &str = r#"export interface User {
  id: string;
  email: string;
  name: string;
}

export interface CreateUserInput {
  email: string;
  name: string;
}

export class UserRepository {
  private users: Map<string, User> = new Map();

  findById(id: string): User | undefined {
    return this.users.get(id);
  }

  findByEmail(email: string): User | undefined {
    for (const user of this.users.values()) {
      if (user.email === email) return user;
    }
    return undefined;
  }

  create(input: CreateUserInput): User {
    const user = { id: String(this.users.size + 1), ...input };
    this.users.set(user.id, user);
    return user;
  }

  delete(id: string): boolean {
    return this.users.delete(id);
  }
}

export function validateEmail(email: string): boolean {
  return email.includes("@");
}

export function validateName(name: string): boolean {
  return name.length > 0;
}

export function validateCreateUserInput(input: CreateUserInput): boolean {
  return validateEmail(input.email) && validateName(input.name);
}

export class UserService {
  constructor(private repo: UserRepository) {}

  getUser(id: string): User | undefined {
    return this.repo.findById(id);
  }

  createUser(input: CreateUserInput): User {
    if (!validateCreateUserInput(input)) {
      throw new Error("invalid input");
    }
    return this.repo.create(input);
  }

  deleteUser(id: string): boolean {
    const existing = this.repo.findById(id);
    if (!existing) return false;
    return this.repo.delete(id);
  }
}

export function handleCreateUser(service: UserService, input: CreateUserInput): User {
  return service.createUser(input);
}

export function handleGetUser(service: UserService, id: string): User | undefined {
  return service.getUser(id);
}

export function processUserRegistration(service: UserService, input: CreateUserInput): User {
  return handleCreateUser(service, input);
}
"#;

const FIXTURE_FILE: &str = "src/user_service.ts";

fn fixture_workspace() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    write_file(dir.path(), FIXTURE_FILE, USER_SERVICE_TS);
    dir
}

fn write_file(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn indexed_atlas(dir: &TempDir) -> CodeAtlas {
    let atlas = CodeAtlas::new(AtlasConfig::new(dir.path()));
    atlas.index(None).expect("index should succeed");
    atlas
}

fn fixture_id(qualified: &str) -> String {
    format!("{FIXTURE_FILE}:{qualified}")
}

// ---------------------------------------------------------------------------
// Scenario walkthrough
// ---------------------------------------------------------------------------

#[test]
fn test_find_user_service_class() {
    let dir = fixture_workspace();
    let atlas = indexed_atlas(&dir);

    let nodes = atlas
        .find_symbols("UserService", Some(&[SymbolKind::Class]), 10)
        .unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].name, "UserService");
    assert_eq!(nodes[0].kind, SymbolKind::Class);
    assert!(nodes[0].is_exported);
}

#[test]
fn test_find_user_interface_excludes_class() {
    let dir = fixture_workspace();
    let atlas = indexed_atlas(&dir);

    let nodes = atlas
        .find_symbols("User", Some(&[SymbolKind::Interface]), 10)
        .unwrap();
    assert!(
        nodes.iter().any(|n| n.name == "User" && n.kind == SymbolKind::Interface),
        "the User interface must be found"
    );
    assert!(
        !nodes.iter().any(|n| n.name == "UserService"),
        "kind filter must exclude the UserService class"
    );
}

#[test]
fn test_validate_input_callees() {
    let dir = fixture_workspace();
    let atlas = indexed_atlas(&dir);

    let callees = atlas.get_callees(&fixture_id("validateCreateUserInput"));
    let names: Vec<&str> = callees.iter().map(|n| n.name.as_str()).collect();
    assert!(names.contains(&"validateEmail"), "got: {names:?}");
    assert!(names.contains(&"validateName"), "got: {names:?}");
}

#[test]
fn test_find_by_id_callers() {
    let dir = fixture_workspace();
    let atlas = indexed_atlas(&dir);

    let callers = atlas.get_callers(&fixture_id("UserRepository.findById"));
    let qualified: Vec<&str> = callers.iter().map(|n| n.qualified_name.as_str()).collect();
    assert!(qualified.contains(&"UserService.getUser"), "got: {qualified:?}");
    assert!(qualified.contains(&"UserService.deleteUser"), "got: {qualified:?}");
}

#[test]
fn test_registration_to_validate_email_path() {
    let dir = fixture_workspace();
    let atlas = indexed_atlas(&dir);

    let result = atlas
        .find_paths(
            &fixture_id("processUserRegistration"),
            &fixture_id("validateEmail"),
            Some(6),
            None,
        )
        .unwrap();
    assert!(result.start_found && result.target_found);
    assert!(!result.paths.is_empty(), "at least one path must exist");

    let shortest: Vec<&str> = result.paths[0]
        .iter()
        .map(|n| n.qualified_name.as_str())
        .collect();
    assert!(shortest.len() <= 6, "shortest path length must be <= 5 hops");
    assert_eq!(
        shortest,
        vec![
            "processUserRegistration",
            "handleCreateUser",
            "UserService.createUser",
            "validateCreateUserInput",
            "validateEmail",
        ]
    );
    // Monotone: every later path is at least as long as the first.
    for path in &result.paths {
        assert!(path.len() >= shortest.len());
    }
}

#[test]
fn test_fixture_has_no_dead_code() {
    let dir = fixture_workspace();
    let atlas = indexed_atlas(&dir);

    let result = atlas.find_dead_code(None, None).unwrap();
    assert!(
        result.dead.is_empty(),
        "every symbol is exported and reachable, got: {:?}",
        result.dead.iter().map(|d| &d.node.id).collect::<Vec<_>>()
    );
    assert!(result.entry_points > 0);
}

#[test]
fn test_incremental_delete_of_validate_name() {
    let dir = fixture_workspace();
    let atlas = indexed_atlas(&dir);
    assert!(atlas.get_node(&fixture_id("validateName")).is_some());

    // Delete validateName from the source and apply an incremental update.
    let without_validate_name = USER_SERVICE_TS.replace(
        "export function validateName(name: string): boolean {\n  return name.length > 0;\n}\n",
        "",
    );
    assert_ne!(without_validate_name, USER_SERVICE_TS, "fixture edit must apply");
    write_file(dir.path(), FIXTURE_FILE, &without_validate_name);
    atlas.add_or_update_file(FIXTURE_FILE).unwrap();

    // The node is gone.
    assert!(atlas.get_node(&fixture_id("validateName")).is_none());

    // validateCreateUserInput -> validateEmail survives.
    let callees = atlas.get_callees(&fixture_id("validateCreateUserInput"));
    let names: Vec<&str> = callees.iter().map(|n| n.name.as_str()).collect();
    assert!(names.contains(&"validateEmail"), "surviving edge intact");
    assert!(!names.contains(&"validateName"));

    // validateCreateUserInput -> validateName degrades to an unresolved edge.
    let unresolved = atlas.unresolved_edges();
    assert!(
        unresolved
            .iter()
            .any(|e| e.from == fixture_id("validateCreateUserInput")
                && e.to_name == "validateName"
                && e.kind == EdgeKind::Calls),
        "got: {unresolved:?}"
    );
}

#[test]
fn test_trace_from_registration() {
    let dir = fixture_workspace();
    let atlas = indexed_atlas(&dir);

    let result = atlas
        .trace(
            &fixture_id("processUserRegistration"),
            TraceDirection::Forward,
            Some(3),
            Some(&[EdgeKind::Calls]),
            None,
        )
        .unwrap();
    assert!(result.start_found);

    let at_depth = |d: usize| -> Vec<&str> {
        result
            .nodes
            .iter()
            .filter(|h| h.depth == d)
            .map(|h| h.node.qualified_name.as_str())
            .collect()
    };
    assert_eq!(at_depth(1), vec!["handleCreateUser"]);
    assert_eq!(at_depth(2), vec!["UserService.createUser"]);
    let depth3 = at_depth(3);
    assert!(depth3.contains(&"validateCreateUserInput"));
    assert!(depth3.contains(&"UserRepository.create"));
    assert!(
        !result.nodes.iter().any(|h| h.depth > 3),
        "depth bound respected"
    );
}

#[test]
fn test_unknown_start_is_flagged_not_fatal() {
    let dir = fixture_workspace();
    let atlas = indexed_atlas(&dir);

    let trace = atlas
        .trace("src/ghost.ts:nope", TraceDirection::Forward, None, None, None)
        .unwrap();
    assert!(!trace.start_found);
    assert!(trace.nodes.is_empty());

    let paths = atlas
        .find_paths("src/ghost.ts:nope", &fixture_id("validateEmail"), None, None)
        .unwrap();
    assert!(!paths.start_found);
    assert!(paths.paths.is_empty());
}

// ---------------------------------------------------------------------------
// Store-level consistency properties
// ---------------------------------------------------------------------------

fn fixture_store() -> GraphStore {
    let analysis =
        parse_source(FIXTURE_FILE, LanguageKind::TypeScript, USER_SERVICE_TS.as_bytes()).unwrap();
    let lowered = lower_file(FIXTURE_FILE, &analysis);
    let mut store = GraphStore::new();
    store.add_file(FIXTURE_FILE, analysis.parse_errors, lowered.nodes, lowered.edges);
    store.resolve_pending(0.7);
    store
}

#[test]
fn test_file_index_matches_node_files() {
    let store = fixture_store();
    let entry = store.file_entry(FIXTURE_FILE).expect("file entry exists");
    assert!(!entry.nodes.is_empty());
    for &idx in &entry.nodes {
        assert_eq!(store.node(idx).file, FIXTURE_FILE);
    }
    assert_eq!(
        entry.nodes.len(),
        store.stats().nodes,
        "single-file workspace: every node belongs to the file's entry"
    );
}

#[test]
fn test_every_edge_from_is_a_known_node() {
    let store = fixture_store();
    let mut edge_count = 0;
    for (from, _to, _data) in store.edges() {
        assert!(store.get_node(&from.id).is_some());
        edge_count += 1;
    }
    assert_eq!(edge_count, store.stats().edges);
    for pending in store.unresolved_edges() {
        assert!(
            store.get_node(&pending.from).is_some(),
            "unresolved edges keep a resolved origin"
        );
    }
}

#[test]
fn test_remove_file_leaves_no_dangling_edges() {
    let mut store = fixture_store();
    // Second file calling into the fixture.
    let caller_src = "export function boot() { processUserRegistration(); }\n";
    let analysis = parse_source("src/boot.ts", LanguageKind::TypeScript, caller_src.as_bytes()).unwrap();
    let lowered = lower_file("src/boot.ts", &analysis);
    store.add_file("src/boot.ts", false, lowered.nodes, lowered.edges);
    store.resolve_pending(0.7);

    store.remove_file(FIXTURE_FILE);
    for (from, to, _) in store.edges() {
        assert_eq!(from.file, "src/boot.ts");
        assert_eq!(to.file, "src/boot.ts");
    }
    assert!(store.file_entry(FIXTURE_FILE).is_none());
    // The severed call survives as an unresolved edge from the caller.
    assert!(
        store
            .unresolved_edges()
            .iter()
            .any(|e| e.from == "src/boot.ts:boot" && e.to_name == "processUserRegistration")
    );
}

#[test]
fn test_reindex_is_deterministic() {
    let collect = |store: &GraphStore| {
        let mut ids: Vec<String> = store.edges().map(|(f, t, d)| {
            format!("{}->{}:{:?}", f.id, t.id, d.kind)
        }).collect();
        ids.sort();
        let mut nodes: Vec<String> = store
            .file_entry(FIXTURE_FILE)
            .unwrap()
            .nodes
            .iter()
            .map(|&i| store.node(i).id.clone())
            .collect();
        nodes.sort();
        (nodes, ids)
    };

    let first = collect(&fixture_store());
    let second = collect(&fixture_store());
    assert_eq!(first.0, second.0, "node multisets equal across rebuilds");
    assert_eq!(first.1, second.1, "edge multisets equal across rebuilds");
}

#[test]
fn test_trace_matches_graph_distance() {
    // Diamond with a tail: a -> b, a -> c, b -> d, c -> d, d -> e.
    let src = "\
function a() { b(); c(); }
function b() { d(); }
function c() { d(); }
function d() { e(); }
function e() {}
";
    let analysis = parse_source("g.ts", LanguageKind::TypeScript, src.as_bytes()).unwrap();
    let lowered = lower_file("g.ts", &analysis);
    let mut store = GraphStore::new();
    store.add_file("g.ts", false, lowered.nodes, lowered.edges);
    store.resolve_pending(0.7);

    let result = code_atlas::query::trace(
        &store,
        "g.ts:a",
        TraceDirection::Forward,
        2,
        Some(&[EdgeKind::Calls]),
        None,
    )
    .unwrap();

    let mut found: Vec<(String, usize)> = result
        .nodes
        .iter()
        .map(|h| (h.node.name.clone(), h.depth))
        .collect();
    found.sort();
    assert_eq!(
        found,
        vec![
            ("b".to_owned(), 1),
            ("c".to_owned(), 1),
            ("d".to_owned(), 2),
        ],
        "exactly the nodes at distance 1..=2, each at its minimum depth"
    );
}

#[test]
fn test_paths_exist_for_reachable_pairs_in_dag() {
    let src = "\
function a() { b(); c(); }
function b() { d(); }
function c() { d(); }
function d() {}
";
    let analysis = parse_source("g.ts", LanguageKind::TypeScript, src.as_bytes()).unwrap();
    let lowered = lower_file("g.ts", &analysis);
    let mut store = GraphStore::new();
    store.add_file("g.ts", false, lowered.nodes, lowered.edges);
    store.resolve_pending(0.7);

    for (from, to) in [("a", "b"), ("a", "d"), ("b", "d"), ("c", "d")] {
        let result = code_atlas::query::find_paths(
            &store,
            &format!("g.ts:{from}"),
            &format!("g.ts:{to}"),
            10,
            100,
            None,
        )
        .unwrap();
        assert!(!result.paths.is_empty(), "no path found for {from} -> {to}");
        let mut prev_len = 0;
        for path in &result.paths {
            assert!(path.len() >= prev_len, "paths sorted by length");
            prev_len = path.len();
            let mut ids: Vec<&str> = path.iter().map(|n| n.id.as_str()).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), path.len(), "paths are simple");
        }
    }
}

#[test]
fn test_symbol_cache_roundtrip() {
    let dir = fixture_workspace();
    let abs = dir.path().join(FIXTURE_FILE);
    let mtime = fs::metadata(&abs).unwrap().modified().unwrap();

    let first = parse_source(FIXTURE_FILE, LanguageKind::TypeScript, USER_SERVICE_TS.as_bytes())
        .unwrap();
    let cache = code_atlas::cache::SymbolCache::new();
    cache.set(&abs, mtime, Arc::new(first.clone()));

    let cached = cache.get(&abs, mtime).expect("unchanged mtime hits");
    let second = parse_source(FIXTURE_FILE, LanguageKind::TypeScript, USER_SERVICE_TS.as_bytes())
        .unwrap();
    assert_eq!(cached.tree, second.tree, "cached tree equals a fresh parse");
    assert_eq!(first.tree, second.tree, "parsing is deterministic");
}

// ---------------------------------------------------------------------------
// CLI smoke tests
// ---------------------------------------------------------------------------

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_code-atlas"))
}

fn run_in(dir: &TempDir, args: &[&str]) -> String {
    let out = Command::new(binary())
        .arg("--path")
        .arg(dir.path())
        .args(args)
        .output()
        .expect("failed to invoke code-atlas binary");
    let stdout = String::from_utf8_lossy(&out.stdout).to_string();
    assert!(
        out.status.success(),
        "command {args:?} failed\nstdout: {stdout}\nstderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    stdout
}

#[test]
fn test_cli_index_and_find() {
    let dir = fixture_workspace();
    let stats = run_in(&dir, &["index"]);
    assert!(stats.contains("files"), "got: {stats}");

    let found = run_in(&dir, &["find", "UserService", "--kind", "class"]);
    assert!(found.contains("UserService"), "got: {found}");
    assert!(found.contains("user_service.ts"), "got: {found}");
}

#[test]
fn test_cli_callers() {
    let dir = fixture_workspace();
    let out = run_in(&dir, &["callers", "validateEmail"]);
    assert!(out.contains("validateCreateUserInput"), "got: {out}");
}
