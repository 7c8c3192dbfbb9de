//! Prompt templates. Literal braces are doubled; `{name}` is a parameter.

pub const BASIC_MATH_PROMPT: &str = r#"You are a precise calculator.
Evaluate the following arithmetic expression: {expression}

Answer with a single JSON object:
{{"result": <number>, "steps": ["<step>", ...], "confidence_score": <0..1>}}
Steps are short strings, in the order they were performed."#;

pub const CALCULUS_PROMPT: &str = r#"You are a calculus assistant (limits, derivatives, integrals, series).
Task: {expression}

Answer with a single JSON object:
{{"result": <number or expression string>, "steps": ["<step>", ...], "confidence_score": <0..1>}}
If the answer is a number, put it in "result" as a JSON number."#;

pub const FINANCIAL_PROMPT: &str = r#"You are a financial calculator (NPV, IRR, loans, interest).
Task: {expression}
All monetary amounts are in {currency}.

Answer with a single JSON object:
{{"result": <number or string>, "steps": ["<step>", ...], "confidence_score": <0..1>, "metadata": {{"formula": "<formula used>"}}}}"#;

pub const EQUATION_SOLVER_PROMPT: &str = r#"You solve equations and systems of equations.
Equation: {expression}

Answer with a single JSON object:
{{"result": <solution or list of solutions>, "steps": ["<step>", ...], "confidence_score": <0..1>}}"#;

pub const GRAPH_PLOTTER_PROMPT: &str = r#"You prepare data for plotting a 2-D function.
Request: {expression}
Window: x from {x_min} to {x_max}.

Answer with a single JSON object:
{{"result": "<one-line description of the curve>", "steps": ["<step>", ...], "confidence_score": <0..1>,
 "visual_data": {{"function": "<f(x)>", "points": [[x, y], ...]}}}}
Give at least 50 points inside the window."#;
