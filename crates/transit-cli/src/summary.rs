use console::Style;
use transit_core::comparison::{CandidateStatus, ComparisonEnsemble};
use transit_core::matching::MatchedStars;
use transit_core::period::Periodogram;
use transit_core::photometry::LightCurve;
use transit_core::pipeline::PipelineConfig;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
    warning: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
            warning: Style::new().yellow(),
        }
    }
}

fn rule(len: usize) -> String {
    "\u{2550}".repeat(len)
}

pub fn print_pipeline_summary(config: &PipelineConfig) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Transit Pipeline"));
    println!("  {}", s.title.apply_to(rule(16)));
    println!();

    if config.inputs.is_empty() {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Inputs"),
            s.disabled.apply_to("none")
        );
    }
    for input in &config.inputs {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Input"),
            s.path.apply_to(input.display())
        );
    }
    println!(
        "  {:<14}{}",
        s.label.apply_to("Work dir"),
        s.path.apply_to(config.work_dir.display())
    );
    let target = match config.target.star_id {
        Some(id) => format!("star {id}"),
        None => format!(
            "RA {:.6}  Dec {:+.6}  (within {}\")",
            config.target.ra, config.target.dec, config.target.tolerance_arcsec
        ),
    };
    println!(
        "  {:<14}{}",
        s.label.apply_to("Target"),
        s.value.apply_to(target)
    );
    if config.resume {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Resume"),
            s.method.apply_to("from last completed stage")
        );
    }
    println!();

    println!("  {}", s.header.apply_to("Matching"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Tolerance"),
        s.value.apply_to(format!("{}\"", config.matching.tolerance_arcsec))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Reference"),
        s.method.apply_to(&config.matching.reference)
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Min frames"),
        s.value.apply_to(config.matching.min_frames)
    );
    println!();

    let cmp = &config.comparison;
    println!("  {}", s.header.apply_to("Comparison"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Presence"),
        s.value.apply_to(format!("{:.0}%", cmp.min_presence * 100.0))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Ensemble"),
        s.value.apply_to(format!(
            "{}-{} stars",
            cmp.min_ensemble_size, cmp.max_ensemble_size
        ))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Reject"),
        s.value.apply_to(format!("{} sigma", cmp.reject_sigma))
    );
    if cmp.excluded.is_empty() {
        println!(
            "    {:<14}{}",
            s.label.apply_to("Excluded"),
            s.disabled.apply_to("none")
        );
    } else {
        println!(
            "    {:<14}{}",
            s.label.apply_to("Excluded"),
            s.value.apply_to(format!("{} position(s)", cmp.excluded.len()))
        );
    }
    println!();

    let bls = &config.period_search;
    let bound = |p: Option<f64>, auto: &str| match p {
        Some(p) => format!("{p} d"),
        None => auto.to_string(),
    };
    println!("  {}", s.header.apply_to("Period Search"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Periods"),
        s.value.apply_to(format!(
            "{} .. {}",
            bound(bls.min_period, "median spacing"),
            bound(bls.max_period, "half baseline")
        ))
    );
    println!(
        "    {:<14}{:?}",
        s.label.apply_to("Durations"),
        bls.durations
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Phase bins"),
        s.value.apply_to(bls.phase_bins)
    );
    println!();
}

pub fn print_matching_summary(matched: &MatchedStars) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to("Matched Stars"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Frames"),
        s.value.apply_to(matched.frame_count())
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Stars"),
        s.value.apply_to(matched.stars.len())
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Reference"),
        s.value.apply_to(format!("frame {}", matched.reference_frame))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Discarded"),
        s.value.apply_to(format!(
            "{} spurious, {} blended",
            matched.spurious_discarded, matched.blended_discarded
        ))
    );
    print_warning_count(&s, matched.warnings.len());
}

pub fn print_ensemble_summary(ensemble: &ComparisonEnsemble) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to("Comparison Ensemble"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Target"),
        s.value.apply_to(format!(
            "star {} ({:.2}\" from given position)",
            ensemble.target.star_id, ensemble.target.separation_arcsec
        ))
    );
    match ensemble.combined_variability {
        Some(v) => println!(
            "    {:<14}{}",
            s.label.apply_to("Combined CV"),
            s.value.apply_to(format!("{v:.5}"))
        ),
        None => println!(
            "    {:<14}{}",
            s.label.apply_to("Combined CV"),
            s.disabled.apply_to("not measurable")
        ),
    }
    println!();
    println!("    {:>6}  {:>8}  {:>10}", "Star", "Weight", "CV");
    println!("    {}", "-".repeat(28));
    for member in &ensemble.members {
        println!(
            "    {:>6}  {:>8.4}  {:>10.5}",
            member.star_id, member.weight, member.variability
        );
    }

    let rejected = ensemble
        .candidates
        .iter()
        .filter(|c| matches!(c.status, CandidateStatus::Rejected | CandidateStatus::TooVariable))
        .count();
    if rejected > 0 {
        println!(
            "    {}",
            s.warning
                .apply_to(format!("{rejected} candidate(s) rejected as variable"))
        );
    }
}

pub fn print_light_curve_summary(curve: &LightCurve) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to("Light Curve"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Points"),
        s.value.apply_to(curve.len())
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Skipped"),
        s.value.apply_to(curve.skipped_frames)
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Baseline"),
        s.value.apply_to(format!("{:.4} d", curve.baseline()))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Scatter"),
        s.value.apply_to(format!("{:.5} mag", curve.scatter()))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Zero point"),
        s.value.apply_to(format!("{:+.5}", curve.zero_point))
    );
    print_warning_count(&s, curve.warnings.len());
}

pub fn print_period_summary(periodogram: &Periodogram, top: usize) {
    let s = Styles::new();
    let best = &periodogram.best;

    println!();
    println!("  {}", s.header.apply_to("Best Transit Candidate"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Period"),
        s.method.apply_to(format!("{:.6} d", best.period))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Epoch"),
        s.value.apply_to(format!("{:.6}", best.epoch))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Duration"),
        s.value.apply_to(format!(
            "{:.4} d ({:.1}% of period)",
            best.duration,
            best.duration_fraction * 100.0
        ))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Depth"),
        s.value.apply_to(format!("{:.5} mag", best.depth))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Significance"),
        s.value.apply_to(format!("{:.2}", best.significance))
    );

    if top > 0 {
        let mut ranked = periodogram.entries.clone();
        ranked.sort_by(|a, b| b.statistic.total_cmp(&a.statistic));
        println!();
        println!("    {:>5}  {:>12}  {:>10}", "Rank", "Period (d)", "Statistic");
        println!("    {}", "-".repeat(31));
        for (rank, entry) in ranked.iter().take(top).enumerate() {
            println!(
                "    {:>5}  {:>12.6}  {:>10.3}",
                rank + 1,
                entry.period,
                entry.statistic
            );
        }
    }
}

fn print_warning_count(s: &Styles, count: usize) {
    if count > 0 {
        println!(
            "    {:<14}{}",
            s.label.apply_to("Warnings"),
            s.warning.apply_to(count)
        );
    }
}
