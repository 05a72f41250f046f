//! Console formatting for reports

use hive_loader::LoadRecord;
use hive_loader::ingest::format_number;
use hive_loader::report::{ExpandReport, RunReport};
use hive_loader::validate::TableValidation;

const MAX_LISTED: usize = 10;

/// Format header validation results for one table
pub fn format_validation(table: &str, discovered: usize, validation: &TableValidation) -> String {
    let mut output = String::new();
    let status = if validation.is_ok() { "✅" } else { "⚠️ " };
    output.push_str(&format!(
        "\n{} {}: {} file(s), {} accepted, {} rejected\n",
        status,
        table,
        discovered,
        validation.accepted.len(),
        validation.rejected.len()
    ));

    for mismatch in validation.rejected.iter().take(MAX_LISTED) {
        output.push_str(&format!("  - {}\n", mismatch.relative_path));
        if !mismatch.missing.is_empty() {
            output.push_str(&format!("      missing: {:?}\n", mismatch.missing));
        }
        if !mismatch.extra.is_empty() {
            output.push_str(&format!("      extra:   {:?}\n", mismatch.extra));
        }
    }
    if validation.rejected.len() > MAX_LISTED {
        output.push_str(&format!(
            "  ... and {} more\n",
            validation.rejected.len() - MAX_LISTED
        ));
    }

    if let Some(err) = &validation.read_failure {
        output.push_str(&format!("  ✗ {}\n", err.user_message()));
    }

    output
}

/// Format an ingestion run
pub fn format_run_report(report: &RunReport) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "\nRun {} started {}\n",
        report.run_id,
        report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    for table in &report.tables {
        let status = if table.is_success() { "✅" } else { "⚠️ " };
        output.push_str(&format!("\n{} {}\n", status, table.summary()));

        for mismatch in table.header_mismatches.iter().take(MAX_LISTED) {
            output.push_str(&format!(
                "  - rejected {}: missing {:?}, extra {:?}\n",
                mismatch.relative_path, mismatch.missing, mismatch.extra
            ));
        }
        for failed in table.failed.iter().take(MAX_LISTED) {
            let retry = if failed.retryable { "will retry" } else { "fix input" };
            output.push_str(&format!(
                "  - failed {} ({}): {}\n",
                failed.relative_path, retry, failed.reason
            ));
        }
        let listed = table.header_mismatches.len().min(MAX_LISTED) + table.failed.len().min(MAX_LISTED);
        let total = table.header_mismatches.len() + table.failed.len();
        if total > listed {
            output.push_str(&format!("  ... and {} more\n", total - listed));
        }
        if let Some(reason) = &table.read_failure {
            output.push_str(&format!("  ✗ table aborted: {}\n", reason));
        }
        if let Some(reason) = &table.error {
            output.push_str(&format!("  ✗ table failed: {}\n", reason));
        }
    }

    output.push_str(&format!(
        "\nLoaded {} file(s), {} row(s); {} failed\n",
        report.files_loaded(),
        format_number(report.rows_loaded()),
        report.files_failed()
    ));
    output
}

/// Format expansion results
pub fn format_expand_reports(reports: &[ExpandReport]) -> String {
    let mut output = String::new();
    for report in reports {
        let status = if report.is_success() { "✅" } else { "⚠️ " };
        output.push_str(&format!("\n{} {}\n", status, report.summary()));
        for failed in report.failed_shards.iter().take(MAX_LISTED) {
            output.push_str(&format!("  - shard {}: {}\n", failed.shard, failed.reason));
        }
    }
    output
}

/// Format ledger entries for one table
pub fn format_ledger(table: &str, records: &[LoadRecord]) -> String {
    let mut output = format!("\n{}: {} file(s) loaded\n", table, records.len());
    for record in records {
        output.push_str(&format!(
            "  marketplace={} root_category_id={} year={} week={}  {}\n",
            record.marketplace, record.root_category_id, record.year, record.week, record.file_name
        ));
    }
    output
}
