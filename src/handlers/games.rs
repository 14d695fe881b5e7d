//! /random and /choice

use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::command::{BodyResult, CommandSpec, HandlerError};
use crate::params::{BoundArgs, ParamShape, ParamSpec};

const GAME_COOLDOWN: Duration = Duration::from_secs(2);

/// Largest magnitude /random accepts
const RANDOM_BOUND: i64 = 100_000_000_000_000_000;

pub fn random_command() -> CommandSpec {
    CommandSpec::new("random", random)
        .alias("рандом")
        .usage("/random [minimum] <maximum>")
        .rate_limit(GAME_COOLDOWN)
        .param(
            ParamSpec::new("first", ParamShape::Str)
                .label("maximum")
                .help("With a single value the minimum is 0."),
        )
        .param(ParamSpec::new("second", ParamShape::optional(ParamShape::Str)))
}

pub fn choice_command() -> CommandSpec {
    CommandSpec::new("choice", choice)
        .alias("выбери")
        .usage("/choice <option> or <option> or ...")
        .rate_limit(GAME_COOLDOWN)
        .param(ParamSpec::new("text", ParamShape::Str).keyword_only())
}

async fn random(args: BoundArgs) -> BodyResult {
    let first = args.text("first").ok_or(HandlerError::MissingArgument("first"))?;
    let (min, max) = match args.text("second") {
        Some(second) => (first, second),
        None => ("0", first),
    };

    let (Ok(min), Ok(max)) = (min.parse::<i64>(), max.parse::<i64>()) else {
        return Ok("Arguments must be numbers".into());
    };
    if max > RANDOM_BOUND || min < -RANDOM_BOUND {
        return Ok("Too hard...".into());
    }
    if min > max {
        return Ok("The second argument must be greater".into());
    }

    let value = rand::thread_rng().gen_range(min..=max);
    Ok(format!("Let it be {}", value))
}

async fn choice(args: BoundArgs) -> BodyResult {
    let text = args.text("text").ok_or(HandlerError::MissingArgument("text"))?;
    let options = split_options(text);

    let picked = options
        .choose(&mut rand::thread_rng())
        .ok_or_else(|| HandlerError::Failed("nothing to choose from".into()))?;
    Ok(format!("Let it be: {}", picked))
}

/// Split on standalone "or" / "или", ignoring case
fn split_options(text: &str) -> Vec<String> {
    let mut options = vec![Vec::new()];
    for word in text.split_whitespace() {
        if word.to_lowercase() == "or" || word.to_lowercase() == "или" {
            options.push(Vec::new());
        } else if let Some(current) = options.last_mut() {
            current.push(word);
        }
    }
    options.into_iter().map(|words| words.join(" ")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ArgValue;

    fn args(pairs: &[(&str, &str)]) -> BoundArgs {
        let mut args = BoundArgs::new();
        for (name, value) in pairs {
            args.insert(*name, ArgValue::Text(value.to_string()));
        }
        args
    }

    #[test]
    fn test_split_options() {
        assert_eq!(split_options("tea OR coffee or hot water"), ["tea", "coffee", "hot water"]);
        assert_eq!(split_options("да или нет"), ["да", "нет"]);
        assert_eq!(split_options("order pizza"), ["order pizza"]);
    }

    #[tokio::test]
    async fn test_random_single_bound() {
        let reply = random(args(&[("first", "0")])).await.unwrap();
        assert_eq!(reply, "Let it be 0");
    }

    #[tokio::test]
    async fn test_random_range_and_errors() {
        let reply = random(args(&[("first", "5"), ("second", "5")])).await.unwrap();
        assert_eq!(reply, "Let it be 5");

        let reply = random(args(&[("first", "9"), ("second", "1")])).await.unwrap();
        assert_eq!(reply, "The second argument must be greater");

        let reply = random(args(&[("first", "x")])).await.unwrap();
        assert_eq!(reply, "Arguments must be numbers");

        let reply = random(args(&[("first", "1000000000000000000")])).await.unwrap();
        assert_eq!(reply, "Too hard...");
    }

    #[tokio::test]
    async fn test_choice_picks_an_option() {
        let reply = choice(args(&[("text", "left or right")])).await.unwrap();
        assert!(reply == "Let it be: left" || reply == "Let it be: right");
    }
}
