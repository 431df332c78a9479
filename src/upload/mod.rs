//! Batching and retry wrappers around the platform's bulk upload APIs.
//!
//! Every remote bulk operation follows the same shape: submit returns a
//! [`JobHandle`], polling returns a pending marker or a terminal
//! result/error, and [`wait_until_done`] drives the poll loop under a
//! deadline. Batch loops are non-isolating on purpose: a rejected batch
//! surfaces the remote error payload and halts the remaining batches
//! rather than silently continuing past the failure.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use log::{info, warn};
use uuid::Uuid;

use crate::annotation::AnnotationRecord;
use crate::error::FlatlabelError;

/// Recommended batch size for data row uploads.
pub const DATA_ROW_BATCH_SIZE: usize = 20_000;
/// Recommended batch size for annotation imports, counted in data rows.
pub const ANNOTATION_BATCH_SIZE: usize = 10_000;

/// Opaque handle to an asynchronous remote job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobHandle(pub String);

/// One poll observation of a remote job.
#[derive(Clone, Debug, PartialEq)]
pub enum JobStatus {
    Pending,
    Complete(serde_json::Value),
    Failed(Vec<String>),
}

/// Terminal state of a remote job.
#[derive(Clone, Debug, PartialEq)]
pub enum JobOutcome {
    Complete(serde_json::Value),
    Failed(Vec<String>),
}

/// How annotation imports land in the project.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportMethod {
    /// Non-submitted pre-labels (model-assisted labeling).
    MalPrediction,
    /// Submitted labels.
    LabelImport,
}

/// The remote labeling platform, reduced to the operations the
/// orchestrator drives. Every submit returns a job handle; results come
/// back through [`PlatformClient::poll`].
pub trait PlatformClient {
    /// Bulk-creates data rows in a dataset.
    fn create_data_rows(
        &mut self,
        dataset_id: &str,
        rows: &[serde_json::Value],
    ) -> Result<JobHandle, FlatlabelError>;

    /// Resolves global keys to data row ids. The completed job's payload
    /// is a JSON array aligned with the request, `null` for unknown keys.
    fn data_row_ids_for_global_keys(
        &mut self,
        global_keys: &[String],
    ) -> Result<JobHandle, FlatlabelError>;

    /// Sends existing data rows to a project as a named batch.
    fn create_project_batch(
        &mut self,
        project_id: &str,
        batch_name: &str,
        global_keys: &[String],
    ) -> Result<JobHandle, FlatlabelError>;

    /// Imports annotation records into a project.
    fn import_annotations(
        &mut self,
        project_id: &str,
        import_name: &str,
        method: ImportMethod,
        records: &[AnnotationRecord],
    ) -> Result<JobHandle, FlatlabelError>;

    fn poll(&mut self, job: &JobHandle) -> Result<JobStatus, FlatlabelError>;
}

/// Deadline-bounded polling configuration.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub deadline: Duration,
    pub poll_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(240),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Polls a job until it reaches a terminal state or the deadline passes.
pub fn wait_until_done(
    client: &mut dyn PlatformClient,
    job: &JobHandle,
    policy: &RetryPolicy,
) -> Result<JobOutcome, FlatlabelError> {
    let started = Instant::now();
    loop {
        match client.poll(job)? {
            JobStatus::Complete(value) => return Ok(JobOutcome::Complete(value)),
            JobStatus::Failed(errors) => return Ok(JobOutcome::Failed(errors)),
            JobStatus::Pending => {
                if started.elapsed() >= policy.deadline {
                    return Err(FlatlabelError::JobTimeout {
                        job_id: job.0.clone(),
                        deadline_secs: policy.deadline.as_secs(),
                    });
                }
                std::thread::sleep(policy.poll_interval);
            }
        }
    }
}

/// One data row to create, with the dataset it belongs to.
#[derive(Clone, Debug)]
pub struct DataRowUpload {
    pub data_row: serde_json::Value,
    pub dataset_id: String,
}

/// One data row's annotations, with the project they import into.
#[derive(Clone, Debug)]
pub struct AnnotationUpload {
    pub project_id: String,
    pub annotations: Vec<AnnotationRecord>,
}

/// Resolves global keys to data row ids, in batches.
///
/// Keys with no data row are absent from the returned map. Remote
/// errors are surfaced, never swallowed.
pub fn resolve_global_keys(
    client: &mut dyn PlatformClient,
    global_keys: &[String],
    batch_size: usize,
    policy: &RetryPolicy,
) -> Result<BTreeMap<String, String>, FlatlabelError> {
    let mut resolved = BTreeMap::new();
    for chunk in global_keys.chunks(batch_size.max(1)) {
        let job = client.data_row_ids_for_global_keys(chunk)?;
        match wait_until_done(client, &job, policy)? {
            JobOutcome::Complete(value) => {
                let ids: Vec<Option<String>> = serde_json::from_value(value)?;
                for (key, id) in chunk.iter().zip(ids) {
                    if let Some(id) = id {
                        resolved.insert(key.clone(), id);
                    }
                }
            }
            JobOutcome::Failed(errors) => {
                return Err(FlatlabelError::Platform(errors.join("; ")));
            }
        }
    }
    Ok(resolved)
}

/// Vets upload global keys against existing data rows.
///
/// Keys already in use are either dropped (`skip_duplicates`) or renamed
/// with a `{divider}{counter}` suffix until the whole set is free.
pub fn vet_global_keys(
    client: &mut dyn PlatformClient,
    upload: &mut BTreeMap<String, DataRowUpload>,
    skip_duplicates: bool,
    divider: &str,
    policy: &RetryPolicy,
) -> Result<(), FlatlabelError> {
    let mut loop_counter: u32 = 0;
    loop {
        let keys: Vec<String> = upload.keys().cloned().collect();
        if keys.is_empty() {
            return Ok(());
        }
        let taken = resolve_global_keys(client, &keys, DATA_ROW_BATCH_SIZE, policy)?;
        if taken.is_empty() {
            return Ok(());
        }

        if skip_duplicates {
            warn!(
                "{} global key(s) in use by active data rows; skipping their upload",
                taken.len()
            );
            for key in taken.keys() {
                upload.remove(key);
            }
            return Ok(());
        }

        loop_counter += 1;
        warn!(
            "{} global key(s) in use by active data rows; retrying with suffix '{divider}{loop_counter}'",
            taken.len()
        );
        for key in taken.keys() {
            if let Some(mut value) = upload.remove(key) {
                // Strip the previous round's suffix before adding the new one.
                let previous = format!("{divider}{}", loop_counter - 1);
                let root = if loop_counter > 1 {
                    key.strip_suffix(previous.as_str()).unwrap_or(key.as_str())
                } else {
                    key.as_str()
                };
                let renamed = format!("{root}{divider}{loop_counter}");
                if let Some(object) = value.data_row.as_object_mut() {
                    object.insert("global_key".to_string(), serde_json::json!(renamed.clone()));
                }
                upload.insert(renamed, value);
            }
        }
    }
}

/// Creates data rows in batches, grouped by dataset.
///
/// A rejected batch halts the upload and surfaces the remote errors.
pub fn batch_create_data_rows(
    client: &mut dyn PlatformClient,
    upload: &mut BTreeMap<String, DataRowUpload>,
    skip_duplicates: bool,
    divider: &str,
    batch_size: usize,
    policy: &RetryPolicy,
) -> Result<(), FlatlabelError> {
    vet_global_keys(client, upload, skip_duplicates, divider, policy)?;

    let mut by_dataset: BTreeMap<String, Vec<serde_json::Value>> = BTreeMap::new();
    for value in upload.values() {
        by_dataset
            .entry(value.dataset_id.clone())
            .or_default()
            .push(value.data_row.clone());
    }

    let mut batch_number = 0;
    for (dataset_id, rows) in &by_dataset {
        info!(
            "uploading {} data row(s) to dataset {dataset_id}",
            rows.len()
        );
        for batch in rows.chunks(batch_size.max(1)) {
            batch_number += 1;
            info!("batch #{batch_number}: {} data row(s)", batch.len());
            let job = client.create_data_rows(dataset_id, batch)?;
            match wait_until_done(client, &job, policy)? {
                JobOutcome::Complete(_) => {}
                JobOutcome::Failed(errors) => {
                    return Err(FlatlabelError::BatchFailed {
                        batch_number,
                        errors,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Sends data rows to their projects in named batches.
pub fn batch_rows_to_project(
    client: &mut dyn PlatformClient,
    project_ids: &BTreeMap<String, String>,
    batch_name: Option<&str>,
    batch_size: usize,
    policy: &RetryPolicy,
) -> Result<(), FlatlabelError> {
    let batch_name = batch_name
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut by_project: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (global_key, project_id) in project_ids {
        by_project
            .entry(project_id.clone())
            .or_default()
            .push(global_key.clone());
    }

    let mut batch_number = 0;
    for (project_id, keys) in &by_project {
        info!(
            "sending {} data row(s) to project {project_id}",
            keys.len()
        );
        for batch in keys.chunks(batch_size.max(1)) {
            batch_number += 1;
            let job =
                client.create_project_batch(project_id, &format!("{batch_name}-{batch_number}"), batch)?;
            match wait_until_done(client, &job, policy)? {
                JobOutcome::Complete(_) => {}
                JobOutcome::Failed(errors) => {
                    return Err(FlatlabelError::BatchFailed {
                        batch_number,
                        errors,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Imports annotations in batches grouped by project, batch size counted
/// in data rows.
///
/// Records without a `dataRow` reference get one from the resolved
/// global-key map. A rejected batch halts the import.
pub fn batch_upload_annotations(
    client: &mut dyn PlatformClient,
    upload: &BTreeMap<String, AnnotationUpload>,
    global_key_to_data_row_id: Option<&BTreeMap<String, String>>,
    import_name: Option<&str>,
    method: ImportMethod,
    batch_size: usize,
    policy: &RetryPolicy,
) -> Result<(), FlatlabelError> {
    let import_name = import_name
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let resolved;
    let key_map = match global_key_to_data_row_id {
        Some(map) => map,
        None => {
            let keys: Vec<String> = upload.keys().cloned().collect();
            resolved = resolve_global_keys(client, &keys, DATA_ROW_BATCH_SIZE, policy)?;
            &resolved
        }
    };

    // { project_id: { data_row_id: records } }
    let mut by_project: BTreeMap<String, BTreeMap<String, Vec<AnnotationRecord>>> = BTreeMap::new();
    for (global_key, value) in upload {
        let data_row_id = key_map.get(global_key).ok_or_else(|| {
            FlatlabelError::Platform(format!("no data row found for global key '{global_key}'"))
        })?;
        let records: Vec<AnnotationRecord> = value
            .annotations
            .iter()
            .map(|record| {
                if record.data_row.is_some() {
                    record.clone()
                } else {
                    record.clone().with_data_row(data_row_id.clone())
                }
            })
            .collect();
        by_project
            .entry(value.project_id.clone())
            .or_default()
            .insert(data_row_id.clone(), records);
    }

    match method {
        ImportMethod::MalPrediction => info!("uploading annotations as pre-labels (MAL)"),
        ImportMethod::LabelImport => info!("uploading annotations as submitted labels"),
    }

    let mut batch_number = 0;
    for (project_id, per_row) in &by_project {
        info!(
            "uploading annotations for {} data row(s) to project {project_id}",
            per_row.len()
        );
        let data_row_ids: Vec<&String> = per_row.keys().collect();
        for batch_rows in data_row_ids.chunks(batch_size.max(1)) {
            let mut records = Vec::new();
            for data_row_id in batch_rows {
                records.extend(per_row[*data_row_id].iter().cloned());
            }
            batch_number += 1;
            info!(
                "batch #{batch_number}: {} annotation(s) for {} data row(s)",
                records.len(),
                batch_rows.len()
            );
            let job = client.import_annotations(
                project_id,
                &format!("{import_name}-{batch_number}"),
                method,
                &records,
            )?;
            match wait_until_done(client, &job, policy)? {
                JobOutcome::Complete(_) => {}
                JobOutcome::Failed(errors) => {
                    return Err(FlatlabelError::BatchFailed {
                        batch_number,
                        errors,
                    });
                }
            }
        }
    }
    Ok(())
}
