//! Built-in stage templates.
//!
//! Each template is Handlebars text. Every one receives `format_instructions`
//! describing the JSON object its stage extracts.

use crate::domain::StageName;

pub const DECOMPOSE_TEMPLATE: &str = r#"You are an expert editor and a meticulous project manager. Decompose the goal for the artifact below into specific, actionable and verifiable criteria. The criteria will serve as a checklist to guide the revision and to evaluate the result.

## Initial Artifact
"{{initial_artifact}}"

## Goal
"{{goal}}"

## Instructions
1. Focus on what needs to be added, removed or changed in the artifact to meet the goal.
2. Make every criterion concrete. Instead of "make it more creative", write "Tell the story from the perspective of an inanimate object".
3. Every criterion must directly serve the goal.

{{format_instructions}}"#;

pub const PLAN_TEMPLATE: &str = r#"You are a master revision strategist. Create a clear, step-by-step plan to revise the artifact against the criteria. Do not write the revised artifact yet, only the plan.
{{#if has_feedback}}

## Previous Evaluation Feedback (address this first)
The last revision was evaluated and fell short. Prioritise fixing every failure named here:

{{feedback}}
{{/if}}

## Current Artifact
"{{artifact}}"

## Criteria Checklist
{{#each criteria}}
- {{this}}
{{/each}}
{{#unless has_feedback}}

## Previous Evaluation Feedback
{{feedback}}
{{/unless}}

## Instructions
1. Review the current artifact and the criteria.
2. If there is previous feedback, prioritise the points of failure it names.
3. Produce a concise, ordered plan of action for the revision.

{{format_instructions}}"#;

pub const APPLY_TEMPLATE: &str = r#"You are an expert writer. Execute the revision plan to produce a new, improved version of the artifact. Follow the plan precisely.

## Current Artifact
"{{artifact}}"

## Revision Plan
{{#each plan}}
- {{this}}
{{/each}}

## Instructions
1. Carefully implement every step of the plan.
2. Output ONLY the full text of the revised artifact inside the JSON object. No explanation, no preamble.

{{format_instructions}}"#;

pub const EVALUATE_TEMPLATE: &str = r#"You are a meticulous quality assurance analyst. Evaluate the revised artifact against the original using the criteria below. Be objective and critical.

## Original Artifact
"{{initial_artifact}}"

## Revised Artifact
"{{artifact}}"

## Criteria Checklist
{{#each criteria}}
- {{this}}
{{/each}}

## Instructions
1. For each criterion, assess whether the revised artifact meets it.
2. Give an overall score from 1 (no improvement) to 10 (every criterion met).
3. Write a brief, honest rationale: what was done well and what is still missing.
4. The improvement is sufficient when the score is 8 or higher.

{{format_instructions}}"#;

/// Built-in template for a stage
pub fn builtin(stage: StageName) -> &'static str {
    match stage {
        StageName::Decompose => DECOMPOSE_TEMPLATE,
        StageName::Plan => PLAN_TEMPLATE,
        StageName::Apply => APPLY_TEMPLATE,
        StageName::Evaluate => EVALUATE_TEMPLATE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_template_takes_format_instructions() {
        let stages = [StageName::Decompose, StageName::Plan, StageName::Apply, StageName::Evaluate];
        for stage in stages {
            assert!(builtin(stage).contains("{{format_instructions}}"), "{}", stage);
        }
    }

    #[test]
    fn test_plan_template_renders_feedback_in_both_branches() {
        assert_eq!(PLAN_TEMPLATE.matches("{{feedback}}").count(), 2);
    }
}
