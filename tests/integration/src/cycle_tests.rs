//! End-to-end cycles
//!
//! Settings file -> HTTP source -> certificate reconciler with the ostree,
//! command and branding hooks -> orchestrator, against a local stub server
//! and a temporary system layout.

mod server;

use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use entsync_client::HttpEntitlementSource;
use entsync_core::{
    ActionLock, BrandingInstaller, CertificateReconciler, CertificateStore, CommandHook,
    ConsumerIdentity, CycleKind, EntitlementDirectory, HookChain, HookConfig, HookEvent,
    MemoryAudit, Orchestrator, PathSettings, Reconciler, ServerSettings, Settings,
};
use entsync_ostree::{RemoteConfigReconciler, RepoFile};
use entsync_test_utils::{EntitlementBuilder, TestEnv};
use pretty_assertions::assert_eq;
use reqwest::blocking::Client;
use uuid::Uuid;

use server::StubServer;

const REPO_CONFIG: &str = r#"[core]
repo_version=1
mode=bare

[remote "retired-os"]
url=https://cdn.example.com/retired
"#;

fn consumer() -> ConsumerIdentity {
    ConsumerIdentity::new(Uuid::from_u128(0xe2e))
}

fn serials_path() -> String {
    format!("/consumers/{}/certificates/serials", consumer())
}

fn bundles_path() -> String {
    format!("/consumers/{}/certificates", consumer())
}

fn awesome_os() -> EntitlementBuilder {
    EntitlementBuilder::new(102)
        .order("Awesome OS Premium", "C-102")
        .os_brand("72", "Awesome OS Server", "Awesome OS")
        .ostree_content("awesome-os", "https://cdn.example.com/ostree/awesome")
}

/// Settings pointing every path into `env`, saved and loaded back.
fn settings(env: &TestEnv, url: &str) -> Settings {
    let marker = env.root().join("repo-hook.out");
    let settings = Settings {
        paths: PathSettings {
            entitlement_dir: env.entitlement_dir(),
            lock_file: env.lock_file(),
            repo_config: env.repo_config(),
            branded_name: env.branded_name(),
        },
        server: ServerSettings {
            url: url.to_string(),
            timeout_secs: Some(5),
            ..ServerSettings::default()
        },
        hooks: vec![HookConfig {
            event: HookEvent::RepoUpdate,
            command: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                format!(
                    "echo \"$ADDED_SERIALS|$REMOVED_SERIALS\" > '{}'",
                    marker.display()
                ),
            ],
            working_dir: None,
        }],
    };

    let path = env.root().join("entsync.toml");
    settings.save(&path).unwrap();
    let loaded = Settings::load(&path).unwrap();
    assert_eq!(loaded, settings);
    loaded
}

struct Engine {
    orchestrator: Orchestrator,
    lock: Arc<ActionLock>,
    audit: Arc<MemoryAudit>,
}

fn engine(settings: &Settings, root: &Path) -> Engine {
    let store: Arc<dyn CertificateStore> =
        Arc::new(EntitlementDirectory::new(settings.paths.entitlement_dir.clone()));

    let client = Client::builder()
        .timeout(Duration::from_secs(settings.server.timeout_secs.unwrap_or(5)))
        .build()
        .unwrap();
    let source = Arc::new(HttpEntitlementSource::new(settings.server.url.clone(), client).unwrap());

    let ostree = Arc::new(RemoteConfigReconciler::new(
        Arc::clone(&store),
        settings.paths.repo_config.clone(),
    ));
    let repo_hook = HookChain::new("repo")
        .with(ostree.clone())
        .with(Arc::new(CommandHook::new(
            HookEvent::RepoUpdate,
            &settings.hooks,
            root,
        )));
    let branding = Arc::new(BrandingInstaller::new(
        Arc::clone(&store),
        settings.paths.branded_name.clone(),
    ));
    let audit = Arc::new(MemoryAudit::new());

    let certs: Arc<dyn Reconciler> = Arc::new(
        CertificateReconciler::new(Arc::clone(&store), source, consumer())
            .with_repo_hook(Arc::new(repo_hook))
            .with_branding_hook(branding)
            .with_audit(audit.clone()),
    );
    let unregister: Arc<dyn Reconciler> = Arc::new(
        CertificateReconciler::unregistered(Arc::clone(&store)).with_repo_hook(ostree.clone()),
    );
    let remotes: Arc<dyn Reconciler> = ostree;

    let lock = Arc::new(ActionLock::new(settings.paths.lock_file.clone()));
    let orchestrator = Orchestrator::new(Arc::clone(&lock))
        .with_plan(CycleKind::Update, vec![Arc::clone(&certs), Arc::clone(&remotes)])
        .with_plan(CycleKind::Heal, vec![certs])
        .with_plan(CycleKind::Unregister, vec![unregister, remotes]);

    Engine {
        orchestrator,
        lock,
        audit,
    }
}

/// Local {100, 101}, server expects {101, 102}.
fn seeded(server: &StubServer) -> TestEnv {
    let env = TestEnv::new();
    env.install(&EntitlementBuilder::new(100).order("Old Support", "C-100"));
    env.install(&EntitlementBuilder::new(101).product("69", "Awesome OS Addon"));
    env.write("ostree/repo/config", REPO_CONFIG);

    server.respond(&serials_path(), 200, r#"[{"serial":101},{"serial":102}]"#);
    server.respond(
        &bundles_path(),
        200,
        serde_json::Value::Array(vec![awesome_os().bundle_json()]).to_string(),
    );
    env
}

fn remote_names(env: &TestEnv) -> Vec<String> {
    RepoFile::load(env.repo_config())
        .unwrap()
        .remotes()
        .into_iter()
        .map(|r| r.name)
        .collect()
}

#[test]
fn test_update_cycle_end_to_end() {
    let server = StubServer::start();
    let env = seeded(&server);
    let settings = settings(&env, server.base_url());
    let engine = engine(&settings, env.root());

    assert_eq!(
        engine.orchestrator.plan(CycleKind::Update),
        vec!["entitlement-certificates", "ostree-remotes"]
    );

    let cycle = engine.orchestrator.run(CycleKind::Update).unwrap();

    let reports = cycle.reports();
    assert_eq!(reports.len(), 2);
    let certs = reports[0].and_then(|r| r.as_entitlements()).unwrap();
    assert_eq!(certs.added_serials(), vec![102]);
    assert_eq!(certs.rogue_serials(), vec![100]);
    assert!(certs.exceptions.is_empty());
    let remotes = reports[1].and_then(|r| r.as_remotes()).unwrap();
    assert_eq!(remotes.remote_updates, vec!["awesome-os"]);
    assert!(!cycle.disconnected());

    assert_eq!(env.installed_serials(), vec![101, 102]);
    assert_eq!(remote_names(&env), vec!["awesome-os"]);
    let config = env.read(&env.repo_config());
    assert!(config.contains("repo_version=1"), "{}", config);
    assert!(!config.contains("retired-os"), "{}", config);

    assert_eq!(env.read(&env.branded_name()), "Awesome OS\n");
    assert_eq!(env.read(&env.root().join("repo-hook.out")), "102|100\n");
    assert_eq!(
        engine.audit.lines(),
        vec![
            "Added subscription for 'Awesome OS Premium' contract 'C-102'",
            "Added subscription for product 'Awesome OS Server'",
            "Removed subscription for 'Old Support' contract 'C-100'",
        ]
    );

    let requests = server.requests();
    assert_eq!(requests[0], serials_path());
    assert_eq!(requests[1], format!("{}?serials=102", bundles_path()));
    assert!(!engine.lock.is_held_by_current_thread());
}

#[test]
fn test_second_update_is_a_no_op() {
    let server = StubServer::start();
    let env = seeded(&server);
    let engine = engine(&settings(&env, server.base_url()), env.root());

    engine.orchestrator.run(CycleKind::Update).unwrap();
    let marker = env.root().join("repo-hook.out");
    std::fs::remove_file(&marker).unwrap();
    let seen = server.requests().len();

    let cycle = engine.orchestrator.run(CycleKind::Heal).unwrap();

    let certs = cycle.reports()[0].and_then(|r| r.as_entitlements()).unwrap();
    assert_eq!(certs.updates(), 0);
    assert_eq!(env.installed_serials(), vec![101, 102]);
    assert!(!marker.exists(), "hooks run only when something changed");
    assert_eq!(server.requests()[seen..], [serials_path()]);
}

#[test]
fn test_unregister_cycle_clears_certificates_and_remotes() {
    let server = StubServer::start();
    let env = seeded(&server);
    let engine = engine(&settings(&env, server.base_url()), env.root());
    engine.orchestrator.run(CycleKind::Update).unwrap();
    let seen = server.requests().len();

    let cycle = engine.orchestrator.run(CycleKind::Unregister).unwrap();

    let certs = cycle.reports()[0].and_then(|r| r.as_entitlements()).unwrap();
    assert_eq!(certs.rogue_serials(), vec![101, 102]);
    assert!(env.installed_serials().is_empty());
    assert!(remote_names(&env).is_empty());
    assert!(env.read(&env.repo_config()).contains("repo_version=1"));
    assert_eq!(server.requests().len(), seen, "unregister never contacts the server");
}

#[test]
fn test_gone_consumer_aborts_cycle() {
    let server = StubServer::start();
    let env = seeded(&server);
    server.respond(
        &serials_path(),
        410,
        r#"{"displayMessage":"Unit has been deleted"}"#,
    );
    let engine = engine(&settings(&env, server.base_url()), env.root());

    let err = engine.orchestrator.run(CycleKind::Update).unwrap_err();

    assert!(err.is_fatal());
    assert!(err.to_string().contains("Unit has been deleted"), "{}", err);
    assert!(!engine.lock.is_held_by_current_thread());
    assert_eq!(env.installed_serials(), vec![100, 101]);
    assert_eq!(remote_names(&env), vec!["retired-os"]);
}

#[test]
fn test_unreachable_server_leaves_certificates_alone() {
    let closed = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", closed.local_addr().unwrap());
    drop(closed);

    let env = TestEnv::new();
    env.install(&EntitlementBuilder::new(100).ostree_content("awesome-os", "https://cdn.example.com/a"));
    let engine = engine(&settings(&env, &url), env.root());

    let cycle = engine.orchestrator.run(CycleKind::Update).unwrap();

    assert!(cycle.disconnected());
    let reports = cycle.reports();
    assert!(reports[0].is_none());
    assert!(cycle.outcomes[0].error.is_some());
    // The remote config still follows the installed certificates.
    let remotes = reports[1].and_then(|r| r.as_remotes()).unwrap();
    assert_eq!(remotes.remote_updates, vec!["awesome-os"]);
    assert_eq!(env.installed_serials(), vec![100]);
}
