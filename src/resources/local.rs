//! Runners over the local configuration file. Secrets are masked.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::{Profile, Repository};
use crate::error::Error;
use crate::runner::{Reader, Request, Response, Runner};

const MASK: &str = "********";

fn mask(secret: &Option<String>) -> Value {
    match secret {
        Some(_) => Value::String(MASK.into()),
        None => Value::Null,
    }
}

fn profile_json(p: &Profile, active: bool) -> Value {
    json!({
        "name": p.name,
        "active": active,
        "host": p.host,
        "port": p.port,
        "use_tls": p.use_tls,
        "verify": p.verify,
        "username": p.username,
        "password": MASK,
        "client_id": p.client_id,
        "client_secret": mask(&p.client_secret),
        "mongo_url": p.mongo_url.as_ref().map(|_| MASK),
        "timeout": p.timeout,
        "base_url": p.base_url(),
    })
}

fn repository_json(name: &str, r: &Repository) -> Value {
    json!({
        "name": name,
        "url": r.url,
        "reference": r.reference,
        "private_key": mask(&r.private_key),
        "private_key_file": r.private_key_file,
        "commit_name": r.name,
        "commit_email": r.email,
    })
}

pub struct ProfilesRunner;

#[async_trait]
impl Reader for ProfilesRunner {
    async fn get(&self, req: &Request) -> Result<Response> {
        let config = &req.runtime.config;
        let mut rows = Vec::new();
        let mut objects = Vec::new();
        for (name, profile) in &config.profiles {
            let active = *name == config.active_profile;
            rows.push(vec![
                name.clone(),
                profile.base_url(),
                if active { "*".into() } else { String::new() },
            ]);
            objects.push(profile_json(profile, active));
        }
        Ok(Response::table(&["NAME", "URL", "ACTIVE"], rows, Value::Array(objects)))
    }

    async fn describe(&self, req: &Request) -> Result<Response> {
        let name = req.arg(0, "name")?;
        let config = &req.runtime.config;
        let profile = config.profile(name)?;
        Ok(Response {
            object: Some(profile_json(profile, name == config.active_profile)),
            template: "Name: {{name}}\nURL: {{base_url}}\nUsername: {{username}}\nVerify: {{verify}}\nTimeout: {{timeout}}".into(),
            ..Default::default()
        })
    }
}

impl Runner for ProfilesRunner {
    fn name(&self) -> &str {
        "profiles"
    }
    fn reader(&self) -> Option<&dyn Reader> {
        Some(self)
    }
}

pub struct RepositoriesRunner;

#[async_trait]
impl Reader for RepositoriesRunner {
    async fn get(&self, req: &Request) -> Result<Response> {
        let repos = &req.runtime.config.repositories;
        if repos.is_empty() {
            return Ok(Response::text("No repositories configured").with_object(json!([])));
        }
        let rows = repos
            .iter()
            .map(|(name, r)| vec![name.clone(), r.url.clone(), r.reference.clone()])
            .collect();
        let objects = repos.iter().map(|(n, r)| repository_json(n, r)).collect();
        Ok(Response::table(&["NAME", "URL", "REFERENCE"], rows, Value::Array(objects)))
    }

    async fn describe(&self, req: &Request) -> Result<Response> {
        let name = req.arg(0, "name")?;
        let repo = req
            .runtime
            .config
            .repositories
            .get(name)
            .ok_or_else(|| Error::RepositoryNotFound(name.to_string()))?;
        Ok(Response {
            object: Some(repository_json(name, repo)),
            template: "Name: {{name}}\nURL: {{url}}\nReference: {{reference}}".into(),
            ..Default::default()
        })
    }
}

impl Runner for RepositoriesRunner {
    fn name(&self) -> &str {
        "repositories"
    }
    fn reader(&self) -> Option<&dyn Reader> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{Common, Options};
    use crate::runtime::Runtime;
    use std::sync::Arc;

    fn request(runner: Arc<dyn Runner>, args: &[&str]) -> Request {
        Request {
            args: args.iter().map(|s| s.to_string()).collect(),
            common: Common::None,
            options: Options::None,
            runtime: Arc::new(Runtime::for_tests()),
            runner,
        }
    }

    #[tokio::test]
    async fn profiles_mask_passwords() {
        let req = request(Arc::new(ProfilesRunner), &["default"]);
        let resp = ProfilesRunner.describe(&req).await.unwrap();
        let object = resp.object.unwrap();
        assert_eq!(object["password"], MASK);
        assert_eq!(object["active"], true);
    }

    #[tokio::test]
    async fn profiles_list_marks_active() {
        let req = request(Arc::new(ProfilesRunner), &[]);
        let resp = ProfilesRunner.get(&req).await.unwrap();
        assert!(resp.text.starts_with("NAME\tURL\tACTIVE\ndefault\thttps://localhost\t*"));
    }

    #[tokio::test]
    async fn unknown_repository_is_an_error() {
        let req = request(Arc::new(RepositoriesRunner), &["nope"]);
        let err = RepositoriesRunner.describe(&req).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::RepositoryNotFound(_))
        ));
    }
}
