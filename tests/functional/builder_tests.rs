//! Registration scenarios for `WebhookBuilder::complete()`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use kube_webhook_builder::{
    AdmissionResponse, Error, HostManager, Server, ServerError, Webhook, WebhookBuilder,
    WebhookKind, WebhookServer,
};

use crate::common::fixtures::{
    Gadget, GadgetSpec, Gear, GearSpec, Gizmo, GizmoSpec, Sprocket, SprocketSpec, Widget,
    WidgetSpec, test_config, test_manager, test_scheme, volume_v1,
};

fn widget() -> Widget {
    Widget::new("prototype", WidgetSpec::default())
}

#[test]
fn test_defaulter_and_validator_registers_both_paths() {
    let mgr = test_manager();

    let completed = WebhookBuilder::managed_by(mgr.clone())
        .for_type(widget())
        .complete()
        .unwrap();

    assert_eq!(completed.gvk.group, "apps.example.com");
    assert_eq!(completed.gvk.version, "v1");
    assert_eq!(completed.gvk.kind, "Widget");
    assert_eq!(
        completed.mutate_path.as_deref(),
        Some("/mutate-apps-example-com-v1-widget")
    );
    assert_eq!(
        completed.validate_path.as_deref(),
        Some("/validate-apps-example-com-v1-widget")
    );
    assert_eq!(
        mgr.server().paths(),
        vec![
            "/mutate-apps-example-com-v1-widget".to_string(),
            "/validate-apps-example-com-v1-widget".to_string(),
        ]
    );
}

#[test]
fn test_registered_handlers_have_matching_kinds() {
    let mgr = test_manager();
    WebhookBuilder::managed_by(mgr.clone())
        .for_type(widget())
        .complete()
        .unwrap();

    let lookup = |path: &str| {
        let req = axum::http::Request::post(path).body(()).unwrap();
        mgr.server().handler(&req).unwrap()
    };
    let (_, mutating) = lookup("/mutate-apps-example-com-v1-widget");
    let (_, validating) = lookup("/validate-apps-example-com-v1-widget");
    assert_eq!(mutating.kind(), WebhookKind::Mutating);
    assert_eq!(validating.kind(), WebhookKind::Validating);
}

#[test]
fn test_type_without_capabilities_registers_nothing() {
    let mgr = test_manager();

    let completed = WebhookBuilder::managed_by(mgr.clone())
        .for_type(Gadget::new("prototype", GadgetSpec::default()))
        .complete()
        .unwrap();

    assert_eq!(completed.gvk.kind, "Gadget");
    assert_eq!(completed.registered(), 0);
    assert!(mgr.server().paths().is_empty());
}

#[test]
fn test_defaulter_only_registers_mutate_path() {
    let mgr = test_manager();

    let completed = WebhookBuilder::managed_by(mgr.clone())
        .for_type(Gizmo::new("prototype", GizmoSpec::default()))
        .complete()
        .unwrap();

    assert_eq!(
        completed.mutate_path.as_deref(),
        Some("/mutate-apps-example-com-v1-gizmo")
    );
    assert!(completed.validate_path.is_none());
    assert_eq!(
        mgr.server().paths(),
        vec!["/mutate-apps-example-com-v1-gizmo".to_string()]
    );
}

#[test]
fn test_validator_only_registers_validate_path() {
    let mgr = test_manager();

    let completed = WebhookBuilder::managed_by(mgr.clone())
        .for_type(Sprocket::new("prototype", SprocketSpec { teeth: 12 }))
        .complete()
        .unwrap();

    assert!(completed.mutate_path.is_none());
    assert_eq!(
        completed.validate_path.as_deref(),
        Some("/validate-parts-example-com-v1beta1-sprocket")
    );
    assert_eq!(mgr.server().paths().len(), 1);
}

#[test]
fn test_second_registration_is_skipped() {
    let mgr = test_manager();

    let first = WebhookBuilder::managed_by(mgr.clone())
        .for_type(widget())
        .complete()
        .unwrap();
    let second = WebhookBuilder::managed_by(mgr.clone())
        .for_type(widget())
        .complete()
        .unwrap();

    assert_eq!(first.registered(), 2);
    assert_eq!(second.registered(), 0);
    assert_eq!(second.gvk, first.gvk);
    assert_eq!(mgr.server().paths().len(), 2);
}

#[test]
fn test_prefix_handler_does_not_block_registration() {
    let server = Arc::new(Server::new());
    let catch_all = Webhook::new(WebhookKind::Validating, |req| AdmissionResponse::from(req));
    server.register("/", catch_all.clone()).unwrap();
    server
        .register("/mutate-apps-example-com-v1-widget/", catch_all)
        .unwrap();
    let mgr = Arc::new(HostManager::with_server(
        test_config(),
        test_scheme(),
        server.clone(),
    ));

    let completed = WebhookBuilder::managed_by(mgr)
        .for_type(widget())
        .complete()
        .unwrap();

    assert_eq!(completed.registered(), 2);
    assert_eq!(server.paths().len(), 4);
}

#[test]
fn test_unknown_type_fails_type_resolution() {
    let mgr = test_manager();

    let err = WebhookBuilder::managed_by(mgr.clone())
        .for_type(Gear::new("prototype", GearSpec { ratio: 2 }))
        .complete()
        .unwrap_err();

    assert!(matches!(err, Error::TypeResolution(_)), "got {:?}", err);
    assert!(err.to_string().contains("Gear"));
    assert!(mgr.server().paths().is_empty());
}

#[test]
fn test_failed_conversion_check_still_registers() {
    let mgr = test_manager();

    let completed = WebhookBuilder::managed_by(mgr.clone())
        .for_type(volume_v1::Volume::new(
            "prototype",
            volume_v1::VolumeSpec::default(),
        ))
        .complete()
        .unwrap();

    assert_eq!(
        completed.mutate_path.as_deref(),
        Some("/mutate-storage-example-com-v1-volume")
    );
    assert_eq!(
        completed.validate_path.as_deref(),
        Some("/validate-storage-example-com-v1-volume")
    );
    assert_eq!(mgr.server().paths().len(), 2);
}

#[test]
fn test_no_configuration_fails_before_lookup() {
    let err = WebhookBuilder::new()
        .with_config_loader(|| -> kube_webhook_builder::Result<kube::Config> {
            Err(Error::ConfigResolution("no kubeconfig found".to_string()))
        })
        .for_type(widget())
        .complete()
        .unwrap_err();

    assert!(matches!(err, Error::ConfigResolution(_)), "got {:?}", err);
}

#[test]
fn test_loader_errors_become_config_errors() {
    let err = WebhookBuilder::new()
        .with_config_loader(|| -> kube_webhook_builder::Result<kube::Config> {
            Err(Error::MissingManager)
        })
        .for_type(widget())
        .complete()
        .unwrap_err();

    assert!(err.is_config_error());
}

#[test]
fn test_ambient_config_without_manager_is_missing_manager() {
    let err = WebhookBuilder::new()
        .with_config_loader(|| -> kube_webhook_builder::Result<kube::Config> { Ok(test_config()) })
        .for_type(widget())
        .complete()
        .unwrap_err();

    assert!(matches!(err, Error::MissingManager), "got {:?}", err);
}

#[test]
fn test_manager_config_preferred_over_ambient_loader() {
    let loaded = Arc::new(AtomicBool::new(false));
    let flag = loaded.clone();

    WebhookBuilder::managed_by(test_manager())
        .with_config_loader(move || -> kube_webhook_builder::Result<kube::Config> {
            flag.store(true, Ordering::SeqCst);
            Ok(test_config())
        })
        .for_type(widget())
        .complete()
        .unwrap();

    assert!(!loaded.load(Ordering::SeqCst));
}

#[test]
fn test_explicit_config_skips_loader_but_not_manager() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let err = WebhookBuilder::new()
        .with_config(test_config())
        .with_config_loader(move || -> kube_webhook_builder::Result<kube::Config> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(test_config())
        })
        .for_type(widget())
        .complete()
        .unwrap_err();

    assert!(matches!(err, Error::MissingManager));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// A server whose lookup never sees registrations, so every path looks free
/// and the second registrant hits the mux conflict.
struct BlindServer(Server);

impl WebhookServer for BlindServer {
    fn register(
        &self,
        path: &str,
        webhook: Webhook,
    ) -> Result<(), ServerError> {
        self.0.register(path, webhook)
    }

    fn handler(
        &self,
        _req: &axum::http::Request<()>,
    ) -> Option<(String, Webhook)> {
        None
    }
}

struct BlindManager {
    scheme: kube_webhook_builder::Scheme,
    server: Arc<BlindServer>,
}

impl kube_webhook_builder::Manager for BlindManager {
    fn config(&self) -> kube::Config {
        test_config()
    }

    fn scheme(&self) -> &kube_webhook_builder::Scheme {
        &self.scheme
    }

    fn webhook_server(&self) -> Arc<dyn WebhookServer> {
        self.server.clone()
    }
}

#[test]
fn test_registration_conflict_is_not_fatal() {
    let mgr = Arc::new(BlindManager {
        scheme: test_scheme(),
        server: Arc::new(BlindServer(Server::new())),
    });

    let first = WebhookBuilder::managed_by(mgr.clone())
        .for_type(widget())
        .complete()
        .unwrap();
    let second = WebhookBuilder::managed_by(mgr.clone())
        .for_type(widget())
        .complete()
        .unwrap();

    assert_eq!(first.registered(), 2);
    assert_eq!(second.registered(), 0);
    assert_eq!(mgr.server.0.paths().len(), 2);
}
