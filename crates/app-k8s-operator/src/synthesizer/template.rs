use std::path::Path;

use anyhow::{bail, Context as _, Result};
use app_openapi::AppCrd;
use serde::{de::DeserializeOwned, Serialize};
use tera::{Context, Tera};
use tracing::{debug, instrument, Level};

pub const DEPLOYMENT: &str = "deployment.yaml";
pub const INGRESS: &str = "ingress.yaml";
pub const SERVICE: &str = "service.yaml";

const NAMES: [&str; 3] = [DEPLOYMENT, SERVICE, INGRESS];

const EMBEDDED: [(&str, &str); 3] = [
    (DEPLOYMENT, include_str!("../../templates/deployment.yaml")),
    (SERVICE, include_str!("../../templates/service.yaml")),
    (INGRESS, include_str!("../../templates/ingress.yaml")),
];

#[derive(Serialize)]
struct TemplateContext<'a> {
    app: &'a AppCrd,
}

/// The compiled base templates of every child kind.
pub struct Templates {
    tera: Tera,
}

impl Templates {
    /// Templates shipped with the operator binary.
    pub fn embedded() -> Result<Self> {
        Self::from_sources(EMBEDDED)
    }

    /// Loads replacement templates from `dir`, which must hold all three files.
    #[instrument(level = Level::INFO, err(Display))]
    pub async fn load_dir(dir: &Path) -> Result<Self> {
        let mut sources = Vec::with_capacity(NAMES.len());
        for name in NAMES {
            let path = dir.join(name);
            let source = ::tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("failed to read template: {}", path.display()))?;
            sources.push((name, source));
        }

        debug!("loaded templates from {}", dir.display());
        Self::from_sources(sources)
    }

    pub fn from_sources<I, N, S>(sources: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, S)>,
        N: AsRef<str>,
        S: AsRef<str>,
    {
        let mut tera = Tera::default();
        tera.add_raw_templates(sources)
            .context("failed to parse templates")?;

        let missing: Vec<_> = NAMES
            .into_iter()
            .filter(|name| !tera.get_template_names().any(|known| known == *name))
            .collect();
        if !missing.is_empty() {
            bail!("missing templates: {}", missing.join(", "))
        }
        Ok(Self { tera })
    }

    /// Renders the template `name` for `app` and parses the result as `K`.
    pub fn render<K>(&self, name: &str, app: &AppCrd) -> Result<K>
    where
        K: DeserializeOwned,
    {
        let context = Context::from_serialize(TemplateContext { app })
            .context("failed to build template context")?;
        let rendered = self
            .tera
            .render(name, &context)
            .with_context(|| format!("failed to render template: {name}"))?;

        ::serde_yaml::from_str(&rendered)
            .with_context(|| format!("failed to parse rendered template: {name}"))
    }
}
