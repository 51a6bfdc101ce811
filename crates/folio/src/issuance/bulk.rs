use std::collections::HashSet;

use tracing::{info, info_span, warn};

use crate::db::{enrollment_repo, participant_repo, product_repo};
use crate::error::{FolioError, Result};
use crate::issuance::progress::{NoopProgress, ProgressEvent, ProgressReporter};
use crate::issuance::types::{BulkIssueRequest, BulkIssueResult};
use crate::issuance::Issuer;

impl Issuer {
    /// Issues certificates for every eligible enrollment of a product.
    pub fn issue_bulk(&self, request: &BulkIssueRequest) -> Result<BulkIssueResult> {
        self.issue_bulk_with_progress(request, &NoopProgress)
    }

    /// Like [`Issuer::issue_bulk`], reporting each item to `progress`.
    ///
    /// Only product existence, product-level validation and an empty batch
    /// fail the call; every item outcome lands in the result. When a
    /// participant filter leaves nothing to issue, the error names the
    /// requested participants that are not enrolled. Each
    /// certificate commits on its own, so re-running resumes a batch.
    pub fn issue_bulk_with_progress(
        &self,
        request: &BulkIssueRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<BulkIssueResult> {
        let _span = info_span!("issue_bulk", product_id = %request.product_id).entered();

        let kind = request.resolve_kind()?;
        let product = product_repo::find_by_id(&self.db, &request.product_id)?
            .ok_or_else(|| FolioError::not_found("Product", &request.product_id))?;

        if kind.requires_competencies() && product.competencies_text().is_none() {
            return Err(FolioError::Validation(format!(
                "product '{}' has no competencies defined",
                product.name
            )));
        }

        let mut result = BulkIssueResult::default();
        let mut eligible = enrollment_repo::list_without_certificate(&self.db, &product.id, kind)?;

        if let Some(requested) = &request.participant_ids {
            let enrolled: HashSet<String> =
                enrollment_repo::list_for_product(&self.db, &product.id)?
                    .into_iter()
                    .map(|e| e.participant_id)
                    .collect();
            let mut seen = HashSet::new();
            for participant_id in requested {
                if !seen.insert(participant_id.as_str()) || enrolled.contains(participant_id) {
                    continue;
                }
                let name = participant_repo::find_by_id(&self.db, participant_id)?
                    .map(|p| p.full_name)
                    .unwrap_or_else(|| participant_id.clone());
                result.push_error(
                    name,
                    format!("not enrolled in product '{}'", product.name),
                );
            }
            eligible.retain(|d| seen.contains(d.participant_id.as_str()));
        }

        if eligible.is_empty() && !result.errors.is_empty() {
            let names: Vec<&str> = result.errors.iter().map(|e| e.name.as_str()).collect();
            return Err(FolioError::Validation(format!(
                "none of the requested participants can be issued: {} not enrolled in product '{}'",
                names.join(", "),
                product.name
            )));
        }
        if eligible.is_empty() {
            return Err(FolioError::Validation(format!(
                "all eligible enrollments of product '{}' already have a {} certificate",
                product.name, kind
            )));
        }

        let total = eligible.len();
        progress.report(ProgressEvent::Started { total });

        for (index, detail) in eligible.iter().enumerate() {
            let processed = index + 1;
            match self.issue_for(detail, kind) {
                Ok(issued) => {
                    progress.report(ProgressEvent::Issued {
                        name: detail.participant_name.clone(),
                        serial: issued.serial.clone(),
                        processed,
                        total,
                    });
                    result.push_success(detail.participant_name.clone(), issued.serial);
                }
                Err(e) => {
                    warn!(
                        enrollment_id = %detail.enrollment_id,
                        "Issuance failed for {}: {}", detail.participant_name, e
                    );
                    progress.report(ProgressEvent::Failed {
                        name: detail.participant_name.clone(),
                        error: e.to_string(),
                        processed,
                        total,
                    });
                    result.push_error(detail.participant_name.clone(), e.to_string());
                }
            }
        }

        progress.report(ProgressEvent::Finished {
            issued: result.success.len(),
            failed: result.errors.len(),
        });
        info!(
            issued = result.success.len(),
            failed = result.errors.len(),
            "Bulk issuance finished for '{}'",
            product.name
        );
        Ok(result)
    }
}
