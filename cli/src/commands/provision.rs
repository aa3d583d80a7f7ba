use std::path::PathBuf;

use clap::{ArgGroup, Args};
use presence_core::{ProvisioningTemplates, RequestContext, Store, TenantProvisioner};
use serde::Deserialize;

use crate::util::{exit_error, print_json, read_json, report};

#[derive(Args)]
#[command(group(ArgGroup::new("target").required(true).args(["tenant", "tenants_file"])))]
pub struct ProvisionArgs {
    /// Name of the tenant to provision
    #[arg(long)]
    pub tenant: Option<String>,
    /// JSON file listing tenants: `["t1"]`, `[{"name": "t1"}]` or `{"tenants": [...], "templates": {...}}`
    #[arg(long)]
    pub tenants_file: Option<PathBuf>,
    /// JSON provisioning templates (defaults to the built-in set)
    #[arg(long)]
    pub templates: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TenantsFile {
    Names(Vec<String>),
    Records(Vec<TenantRecord>),
    Manifest {
        tenants: Vec<String>,
        #[serde(default)]
        templates: Option<ProvisioningTemplates>,
    },
}

#[derive(Debug, Deserialize)]
struct TenantRecord {
    #[serde(alias = "Name")]
    name: String,
}

impl TenantsFile {
    fn into_parts(self) -> (Vec<String>, Option<ProvisioningTemplates>) {
        match self {
            TenantsFile::Names(tenants) => (tenants, None),
            TenantsFile::Records(records) => (records.into_iter().map(|r| r.name).collect(), None),
            TenantsFile::Manifest { tenants, templates } => (tenants, templates),
        }
    }
}

/// Trims names and rejects blanks and duplicates.
fn normalize_tenants(names: Vec<String>) -> Result<Vec<String>, String> {
    let mut tenants: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim();
        if name.is_empty() {
            return Err("tenant names must not be blank".to_string());
        }
        if tenants.iter().any(|seen| seen == name) {
            return Err(format!("tenant '{name}' is listed twice"));
        }
        tenants.push(name.to_string());
    }
    if tenants.is_empty() {
        return Err("no tenants to provision".to_string());
    }
    Ok(tenants)
}

pub async fn run<S: Store>(store: S, ctx: &RequestContext, args: ProvisionArgs) -> i32 {
    let (names, file_templates) = match (args.tenant, &args.tenants_file) {
        (Some(name), _) => (vec![name], None),
        (None, Some(path)) => match read_json::<TenantsFile>(path) {
            Ok(file) => file.into_parts(),
            Err(message) => exit_error(
                &message,
                Some("Expected a JSON array of tenant names or `{\"name\": ..}` objects, or an object with `tenants` and optional `templates`"),
            ),
        },
        (None, None) => exit_error("Either --tenant or --tenants-file is required", None),
    };
    let tenants = normalize_tenants(names).unwrap_or_else(|message| exit_error(&message, None));

    let templates = match &args.templates {
        Some(path) => read_json::<ProvisioningTemplates>(path).unwrap_or_else(|message| {
            exit_error(&message, Some("Run `presence templates` for the expected shape"))
        }),
        None => file_templates.unwrap_or_else(ProvisioningTemplates::standard),
    };

    let provisioner = TenantProvisioner::new(store);
    match provisioner.provision_many(ctx, &tenants, &templates).await {
        Ok(provisioned) => print_json(&provisioned),
        Err(err) => report(&err, ctx.correlation_id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_core::memory::MemoryStore;

    #[test]
    fn test_tenants_file_accepts_plain_list() {
        let file: TenantsFile = serde_json::from_str(r#"["t1", "t2"]"#).unwrap();
        let (tenants, templates) = file.into_parts();
        assert_eq!(tenants, vec!["t1", "t2"]);
        assert!(templates.is_none());
    }

    #[test]
    fn test_tenants_file_accepts_tenant_objects() {
        let file: TenantsFile =
            serde_json::from_str(r#"[{"name": "acme", "id": null}, {"Name": "globex"}]"#).unwrap();
        let (tenants, templates) = file.into_parts();
        assert_eq!(tenants, vec!["acme", "globex"]);
        assert!(templates.is_none());

        assert!(serde_json::from_str::<TenantsFile>(r#"[{"label": "acme"}]"#).is_err());
    }

    #[test]
    fn test_tenants_file_accepts_manifest_with_templates() {
        let file: TenantsFile = serde_json::from_str(
            r#"{
                "tenants": ["acme"],
                "templates": {
                    "channels": [{"name": "voice", "label": "Voice", "kind": "voice"}],
                    "system_statuses": [{"name": "Available", "label": "Available", "starting_status": true}]
                }
            }"#,
        )
        .unwrap();
        let (tenants, templates) = file.into_parts();
        let templates = templates.unwrap();
        assert_eq!(tenants, vec!["acme"]);
        assert_eq!(templates.channels.len(), 1);
        assert_eq!(templates.system_statuses[0].name, "Available");
        assert!(templates.signals.is_empty());
    }

    #[test]
    fn test_normalize_tenants_trims_and_rejects_bad_input() {
        assert_eq!(
            normalize_tenants(vec![" t1 ".into(), "t2".into()]).unwrap(),
            vec!["t1", "t2"]
        );
        assert!(normalize_tenants(vec!["t1".into(), "  ".into()]).is_err());
        assert!(normalize_tenants(vec!["t1".into(), "t1 ".into()]).is_err());
        assert!(normalize_tenants(Vec::new()).is_err());
    }

    #[tokio::test]
    async fn test_run_provisions_into_store() {
        let store = MemoryStore::new();
        let args = ProvisionArgs {
            tenant: Some("t1".into()),
            tenants_file: None,
            templates: None,
        };
        let code = run(store.clone(), &RequestContext::background(), args).await;

        assert_eq!(code, 0);
        let state = store.snapshot().await;
        assert_eq!(state.tenants.len(), 1);
        assert!(!state.statuses.is_empty());
    }
}
