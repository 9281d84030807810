// Pure merge of fallacy findings and fact-check verdicts. No I/O;
// deterministic for identical inputs.

use std::collections::{HashMap, HashSet};

use threadlens_common::{Claim, FactCheckVerdict, Report, ThreadDocument};

use crate::fallacy::ThreadAnalysis;

/// Join fallacy findings with fact-check verdicts on comment reference.
///
/// Output order follows the document, never extraction or response order.
/// A comment that carried a claim but got no verdict receives the fixed
/// `UNPROVEN` placeholder; a comment with no claim carries no fact-check
/// section at all.
pub fn aggregate(
    document: &ThreadDocument,
    analysis: ThreadAnalysis,
    claims: &[Claim],
    mut verdicts: HashMap<String, FactCheckVerdict>,
) -> Report {
    let claimed: HashSet<&str> = claims.iter().map(|c| c.comment_ref.as_str()).collect();

    let mut findings = analysis.findings;
    for finding in &mut findings {
        if claimed.contains(finding.comment_ref.as_str()) {
            let verdict = verdicts
                .remove(&finding.comment_ref)
                .unwrap_or_else(|| FactCheckVerdict::unproven(finding.comment_ref.as_str()));
            finding.fact_check = Some(verdict);
        }
    }

    findings.sort_by_key(|f| document.position_of(&f.comment_ref).unwrap_or(usize::MAX));

    Report {
        overall_summary: analysis.overall_summary,
        overall_argument_type: analysis.overall_argument_type,
        findings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{claim, document_with_comments, finding};
    use threadlens_common::{OverallArgumentType, Verdict};

    fn analysis(findings: Vec<threadlens_common::CommentFinding>) -> ThreadAnalysis {
        ThreadAnalysis {
            findings,
            overall_summary: "Mixed.".to_string(),
            overall_argument_type: OverallArgumentType::MixedDiscussion,
        }
    }

    #[test]
    fn test_orders_by_document_not_response() {
        let doc = document_with_comments(&[
            ("t1_a", "alice", "first"),
            ("t1_b", "bob", "second"),
            ("t1_c", "carol", "third"),
        ]);

        // Response order scrambled on purpose.
        let report = aggregate(
            &doc,
            analysis(vec![finding("t1_c", "carol"), finding("t1_a", "alice"), finding("t1_b", "bob")]),
            &[],
            HashMap::new(),
        );

        let refs: Vec<&str> = report
            .findings
            .iter()
            .map(|f| f.comment_ref.as_str())
            .collect();
        assert_eq!(refs, vec!["t1_a", "t1_b", "t1_c"]);
    }

    #[test]
    fn test_claim_without_verdict_becomes_unproven() {
        let doc = document_with_comments(&[("t1_a", "alice", "text")]);
        let claims = vec![claim("t1_a", "alice", "checkable thing")];

        let report = aggregate(&doc, analysis(vec![finding("t1_a", "alice")]), &claims, HashMap::new());

        let fact_check = report.findings[0].fact_check.as_ref().unwrap();
        assert_eq!(fact_check.verdict, Verdict::Unproven);
        assert!(fact_check.citations.is_empty());
    }

    #[test]
    fn test_comment_without_claim_has_no_fact_check() {
        let doc = document_with_comments(&[("t1_a", "alice", "text")]);

        let report = aggregate(&doc, analysis(vec![finding("t1_a", "alice")]), &[], HashMap::new());

        assert!(report.findings[0].fact_check.is_none());
    }

    #[test]
    fn test_verdict_attached_by_comment_ref() {
        let doc = document_with_comments(&[("t1_a", "alice", "text")]);
        let claims = vec![claim("t1_a", "alice", "checkable thing")];

        let mut verdicts = HashMap::new();
        verdicts.insert(
            "t1_a".to_string(),
            FactCheckVerdict {
                comment_ref: "t1_a".to_string(),
                verdict: Verdict::False,
                explanation: "contradicted".to_string(),
                citations: vec!["https://example.org".to_string()],
            },
        );

        let report = aggregate(&doc, analysis(vec![finding("t1_a", "alice")]), &claims, verdicts);

        let fact_check = report.findings[0].fact_check.as_ref().unwrap();
        assert_eq!(fact_check.verdict, Verdict::False);
        assert_eq!(fact_check.citations.len(), 1);
    }
}
