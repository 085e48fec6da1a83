/// What the envelope labels the payload as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTarget {
    /// A tool-response parameter value
    Value,
    /// Assistant message content
    Content,
}

impl PromptTarget {
    fn noun(&self) -> &'static str {
        match self {
            PromptTarget::Value => "value",
            PromptTarget::Content => "content",
        }
    }

    fn heading(&self) -> &'static str {
        match self {
            PromptTarget::Value => "VALUE TO EVALUATE",
            PromptTarget::Content => "CONTENT TO EVALUATE",
        }
    }
}

/// Wrap user criteria in the fixed compliance-validator envelope. The
/// wording is stable for reproducibility; only the target noun varies.
pub fn build_prompt(target: PromptTarget, criteria: &str, payload: &str) -> String {
    format!(
        r#"You are a compliance validator. Evaluate the following {noun} against the criteria below.

USER CRITERIA:
{criteria}

{heading}:
{payload}

INSTRUCTIONS:
1. Make a binary decision: does the {noun} meet the criteria or not?
2. Provide a brief explanation for your decision
3. Respond ONLY with valid JSON in this exact format:

{{"compliant": true, "reason": "your explanation"}}

OR

{{"compliant": false, "reason": "your explanation"}}

Do not include any text outside the JSON. Do not use markdown code blocks."#,
        noun = target.noun(),
        heading = target.heading(),
        criteria = criteria,
        payload = payload,
    )
}
