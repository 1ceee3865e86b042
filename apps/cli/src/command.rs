//! Command-line parsing.

use anyhow::{anyhow, bail, Result};

pub const USAGE: &str = "\
Usage: brokerdata <command> [args]

Commands:
  quote SYMBOL...                      Quote one or more symbols
  history SYMBOL [PERIOD] [TIMEFRAME]  Historical bars (default 1M 1D)
  volatility SYMBOL [PERIOD]           Annualized volatility of daily closes (default 1Y)
  account                              Account summary (IBKR)
  positions                            Open positions (IBKR)
  search PATTERN                       Contract search (IBKR)
  probe                                Reachability of every configured provider

Environment:
  BD_CONFIG_FILE      JSON provider config; BD_* variables are used otherwise
  BD_PROVIDER_ORDER   Comma-separated priority, e.g. \"ibkr,tastytrade\"
  BD_LOG_FORMAT       text (default) or json
  RUST_LOG            Log filter, default \"info\"";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Quote {
        symbols: Vec<String>,
    },
    History {
        symbol: String,
        period: String,
        timeframe: String,
    },
    Volatility {
        symbol: String,
        period: String,
    },
    Account,
    Positions,
    Search {
        pattern: String,
    },
    Probe,
    Help,
}

impl Command {
    /// Parse arguments, excluding the program name.
    pub fn parse(args: &[String]) -> Result<Self> {
        let (name, rest) = match args.split_first() {
            Some((name, rest)) => (name.as_str(), rest),
            None => return Ok(Self::Help),
        };

        let command = match name {
            "quote" => {
                if rest.is_empty() {
                    bail!("quote needs at least one symbol");
                }
                Self::Quote {
                    symbols: rest.to_vec(),
                }
            }
            "history" => {
                let (symbol, extra) = required(rest, "history", "SYMBOL")?;
                expect_at_most(extra, 2, "history")?;
                Self::History {
                    symbol,
                    period: arg_or(extra, 0, "1M"),
                    timeframe: arg_or(extra, 1, "1D"),
                }
            }
            "volatility" => {
                let (symbol, extra) = required(rest, "volatility", "SYMBOL")?;
                expect_at_most(extra, 1, "volatility")?;
                Self::Volatility {
                    symbol,
                    period: arg_or(extra, 0, "1Y"),
                }
            }
            "account" => {
                expect_at_most(rest, 0, "account")?;
                Self::Account
            }
            "positions" => {
                expect_at_most(rest, 0, "positions")?;
                Self::Positions
            }
            "search" => {
                let (pattern, extra) = required(rest, "search", "PATTERN")?;
                expect_at_most(extra, 0, "search")?;
                Self::Search { pattern }
            }
            "probe" => {
                expect_at_most(rest, 0, "probe")?;
                Self::Probe
            }
            "help" | "-h" | "--help" => Self::Help,
            other => bail!("unknown command '{}'", other),
        };
        Ok(command)
    }
}

fn required<'a>(args: &'a [String], command: &str, what: &str) -> Result<(String, &'a [String])> {
    args.split_first()
        .map(|(first, rest)| (first.clone(), rest))
        .ok_or_else(|| anyhow!("{} needs {}", command, what))
}

fn expect_at_most(args: &[String], max: usize, command: &str) -> Result<()> {
    if args.len() > max {
        bail!("too many arguments for {}", command);
    }
    Ok(())
}

fn arg_or(args: &[String], index: usize, default: &str) -> String {
    args.get(index)
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Command> {
        let args: Vec<String> = line.split_whitespace().map(String::from).collect();
        Command::parse(&args)
    }

    #[test]
    fn test_quote_takes_many_symbols() {
        assert_eq!(
            parse("quote AAPL MSFT").unwrap(),
            Command::Quote {
                symbols: vec!["AAPL".to_string(), "MSFT".to_string()]
            }
        );
        assert!(parse("quote").is_err());
    }

    #[test]
    fn test_history_defaults() {
        assert_eq!(
            parse("history AAPL").unwrap(),
            Command::History {
                symbol: "AAPL".to_string(),
                period: "1M".to_string(),
                timeframe: "1D".to_string(),
            }
        );
        assert_eq!(
            parse("history AAPL 1D 5m").unwrap(),
            Command::History {
                symbol: "AAPL".to_string(),
                period: "1D".to_string(),
                timeframe: "5m".to_string(),
            }
        );
        assert!(parse("history AAPL 1D 5m extra").is_err());
    }

    #[test]
    fn test_volatility_defaults_to_one_year() {
        assert_eq!(
            parse("volatility SPY").unwrap(),
            Command::Volatility {
                symbol: "SPY".to_string(),
                period: "1Y".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_and_unknown() {
        assert_eq!(parse("").unwrap(), Command::Help);
        assert_eq!(parse("--help").unwrap(), Command::Help);
        assert!(parse("trade AAPL").is_err());
        assert!(parse("search").is_err());
        assert!(parse("account now").is_err());
    }
}
