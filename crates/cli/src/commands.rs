use anyhow::{bail, Context, Result};
use sift_core::StoredTransaction;
use sift_import::{
    decode_upload, recategorize as plan_recategorize, CompiledRuleSet, ParseEngine, ParseError,
    PreviewRow, Profile, StagedBatch,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

fn load_profile(path: &Path) -> Result<Profile> {
    Profile::load(path).with_context(|| format!("loading profile {}", path.display()))
}

fn print_rows(rows: &[PreviewRow], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rows)?);
        return Ok(());
    }
    for row in rows {
        println!(
            "{:>5}  {}  {:>12.2}  {:<24}  {}",
            row.row_index, row.date, row.amount, row.category, row.description
        );
    }
    Ok(())
}

pub fn check(profile_path: &Path) -> Result<()> {
    let profile = load_profile(profile_path)?;
    let compiled = CompiledRuleSet::compile(&profile.rules);

    println!(
        "Parse rule '{}' for account {} is valid.",
        profile.schema.name, profile.schema.account_id
    );
    for (n, category) in compiled.categories().iter().enumerate() {
        println!(
            "{:>3}. {} (priority {}, {} rules)",
            n + 1,
            category.name,
            category.priority,
            category.rule_count()
        );
    }
    println!("  -> {} otherwise", compiled.fallback_name());
    Ok(())
}

pub fn parse(
    profile_path: &Path,
    file: &Path,
    collect_errors: bool,
    json: bool,
    stage: Option<&Path>,
) -> Result<()> {
    let profile = load_profile(profile_path)?;
    let data = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;

    let compiled = CompiledRuleSet::compile(&profile.rules);
    let engine = ParseEngine::new(&compiled);

    if collect_errors {
        let content = decode_upload(&data).map_err(ParseError::from)?;
        let report = engine.parse_collecting(&profile.schema, content)?;
        let is_clean = report.is_clean();
        let batch = StagedBatch {
            owner: profile.schema.owner,
            account_id: profile.schema.account_id,
            checksum: sift_import::staging::checksum(&data),
            rows: report.rows,
        };
        print_rows(&batch.preview(&compiled), json)?;
        for e in &report.errors {
            eprintln!("{}: {e}", e.kind());
        }
        if !is_clean {
            bail!("{} invalid rows in {}", report.errors.len(), file.display());
        }
        return Ok(());
    }

    let batch = StagedBatch::stage(&engine, &profile.schema, &data)?;
    print_rows(&batch.preview(&compiled), json)?;

    if let Some(out) = stage {
        let writer = BufWriter::new(
            File::create(out).with_context(|| format!("creating {}", out.display()))?,
        );
        batch.write_csv(writer)?;
        tracing::info!(rows = batch.rows.len(), checksum = %batch.checksum, "staged upload");
    }
    Ok(())
}

pub fn recategorize(profile_path: &Path, transactions_path: &Path, write: bool) -> Result<()> {
    let profile = load_profile(profile_path)?;
    let content = std::fs::read_to_string(transactions_path)
        .with_context(|| format!("reading {}", transactions_path.display()))?;
    let mut transactions: Vec<StoredTransaction> = serde_json::from_str(&content)
        .with_context(|| format!("decoding {}", transactions_path.display()))?;

    let compiled = CompiledRuleSet::compile(&profile.rules);
    let plan = plan_recategorize(&compiled, &transactions);

    let name = |id| compiled.category_name(id).unwrap_or("?").to_string();
    for change in &plan.changes {
        println!(
            "{}: {} -> {}",
            change.transaction_id,
            name(change.from),
            name(change.to)
        );
    }
    println!(
        "{} changed, {} unchanged, {} manual overrides kept",
        plan.changes.len(),
        plan.unchanged,
        plan.skipped_overrides
    );

    if write && !plan.is_empty() {
        plan.apply(&mut transactions);
        std::fs::write(transactions_path, serde_json::to_string_pretty(&transactions)?)
            .with_context(|| format!("writing {}", transactions_path.display()))?;
    }
    Ok(())
}
