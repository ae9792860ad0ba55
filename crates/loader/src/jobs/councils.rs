//! Councils: local authorities first, then each service's contact points.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use cmsload_storage::ContentStore;
use serde::Serialize;
use tracing::info;

use crate::index::ExistingIndex;
use crate::loader::{LoadError, LoadOptions, Loader, RunSummary};
use crate::plans::council::{
    ContactPointPlan, CouncilDirectory, CouncilRecord, LocalAuthorityPlan, Service, ServiceRecord,
    COUNCILS_FILE, LOCAL_AUTHORITY,
};
use crate::ratelimit::RateLimiter;
use crate::runlog::RunLog;
use crate::source::{SourceError, StaticSource};

/// Authority records plus the contact records of each selected service.
#[derive(Debug, Clone, Default)]
pub struct CouncilDatasets {
    pub councils: Vec<CouncilRecord>,
    pub services: Vec<(Service, Vec<ServiceRecord>)>,
    /// Base URL for relative `documentDownload` paths.
    pub downloads_url: Option<String>,
}

impl CouncilDatasets {
    /// Read `councils.json` and `<service>.json` for each of `services`
    /// from `dir`. Any missing or malformed file is fatal.
    pub fn read(dir: &Path, services: &[Service]) -> Result<Self, SourceError> {
        let councils = StaticSource::new(dir.join(COUNCILS_FILE)).read()?;
        let services = services
            .iter()
            .map(|&service| {
                StaticSource::new(dir.join(service.data_file()))
                    .read()
                    .map(|records| (service, records))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            councils,
            services,
            downloads_url: None,
        })
    }

    pub fn with_downloads_url(mut self, url: Option<String>) -> Self {
        self.downloads_url = url;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CouncilReport {
    pub authorities: RunSummary,
    /// Service type -> summary.
    pub services: BTreeMap<String, RunSummary>,
}

impl CouncilReport {
    pub fn total(&self) -> RunSummary {
        let mut total = self.authorities.clone();
        for summary in self.services.values() {
            total.merge(summary);
        }
        total
    }
}

/// Load authorities, then contact points for each service, into one log.
pub async fn load_councils<S>(
    store: &S,
    data: &CouncilDatasets,
    options: &LoadOptions,
    limiter: Arc<dyn RateLimiter>,
    log: &mut RunLog,
) -> Result<CouncilReport, LoadError>
where
    S: ContentStore + ?Sized,
{
    let mut report = CouncilReport::default();
    report.authorities = Loader::new(store, &LocalAuthorityPlan, options.clone())
        .with_limiter(limiter.clone())
        .run_into(&data.councils, log)
        .await?;

    let index = ExistingIndex::build(store, &[&LOCAL_AUTHORITY], &options.index).await?;
    info!(
        "{} local authorities available for linking",
        index.len(LOCAL_AUTHORITY.id)
    );

    for (service, records) in &data.services {
        let plan = ContactPointPlan::new(*service, CouncilDirectory::new(&data.councils, &index))
            .with_downloads_url(data.downloads_url.clone());
        let summary = Loader::new(store, &plan, options.clone())
            .with_limiter(limiter.clone())
            .run_into(records, log)
            .await?;
        report
            .services
            .insert(service.service_type().to_string(), summary);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::NoDelay;
    use cmsload_storage::MemoryStore;
    use serde_json::json;

    fn write(dir: &Path, name: &str, value: serde_json::Value) {
        std::fs::write(dir.join(name), value.to_string()).unwrap();
    }

    fn dataset_dir() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "councils.json",
            json!([
                { "title": "Aberdeen City Council", "shortCode": "ABD", "authorityType": "Unitary" },
                { "title": "Angus Council", "shortCode": "ANS", "authorityType": "Unitary" }
            ]),
        );
        write(
            tmp.path(),
            "dhp.json",
            json!([
                { "shortCode": "ABD", "phone": "01224 000000", "webLink": "https://example.gov.uk/abd", "text": "Apply online.", "documentDownload": "dhp/abd.pdf" },
                { "shortCode": "ANS", "phone": "01307 000000" },
                { "shortCode": "XXX", "phone": "0" }
            ]),
        );
        write(
            tmp.path(),
            "lwa.json",
            json!([{ "shortCode": "ANS", "email": "lwa@example.gov.uk" }]),
        );
        tmp
    }

    fn options(dir: &Path) -> LoadOptions {
        LoadOptions {
            log_dir: dir.to_path_buf(),
            ..LoadOptions::default()
        }
    }

    #[test]
    fn missing_service_file_is_fatal() {
        let tmp = dataset_dir();
        let err = CouncilDatasets::read(tmp.path(), &[Service::Homelessness]).unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }

    #[tokio::test]
    async fn authorities_then_services_then_rerun_is_noop() {
        let tmp = dataset_dir();
        let data = CouncilDatasets::read(tmp.path(), &[Service::Dhp, Service::Lwa])
            .unwrap()
            .with_downloads_url(Some("https://downloads.example.org".to_string()));
        let store = MemoryStore::new();

        let mut log = RunLog::new(tmp.path().join("logs"));
        let report = load_councils(&store, &data, &options(tmp.path()), Arc::new(NoDelay), &mut log)
            .await
            .unwrap();

        assert_eq!(report.authorities.synced, 2);
        let dhp = &report.services["DHP"];
        assert_eq!(dhp.synced, 2);
        assert_eq!(dhp.failed, 1);
        assert_eq!(report.services["LWA"].synced, 1);
        assert_eq!(store.entries_of("dataLocalAuthority").len(), 2);
        assert_eq!(store.entries_of("dataContactPoint").len(), 3);
        assert_eq!(store.entries_of("topicExternalLink").len(), 1);
        assert_eq!(store.assets().len(), 1);
        assert_eq!(dhp.created_entries, 4);
        assert_eq!(log.lines_written(), 6);
        let text = std::fs::read_to_string(log.path()).unwrap();
        let sequences: Vec<usize> = text
            .lines()
            .map(|line| line.split_once(". ").unwrap().0.parse().unwrap())
            .collect();
        assert_eq!(sequences, vec![1, 2, 3, 4, 5, 6]);

        let writes = store.writes();
        let mut log = RunLog::new(tmp.path().join("logs"));
        let again = load_councils(&store, &data, &options(tmp.path()), Arc::new(NoDelay), &mut log)
            .await
            .unwrap();
        assert_eq!(again.total().created_entries, 0);
        assert_eq!(again.total().failed, 1);
        assert_eq!(store.writes(), writes);
    }
}
