//! Deciding which monetary token is the amount, which is the balance, and
//! which way the money moved

use crate::models::BALANCE_TOLERANCE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Deposit,
    Withdrawal,
}

impl Direction {
    /// `(deposit, withdrawal)` columns for `amount`
    pub fn split(self, amount: f64) -> (f64, f64) {
        match self {
            Self::Deposit => (amount, 0.0),
            Self::Withdrawal => (0.0, amount),
        }
    }

    fn apply(self, previous: f64, amount: f64) -> f64 {
        match self {
            Self::Deposit => previous + amount,
            Self::Withdrawal => previous - amount,
        }
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < BALANCE_TOLERANCE
}

/// Balance continuity over both token orders and both directions.
///
/// Returns `(direction, amount, balance)` only when exactly one candidate
/// satisfies `previous ± amount = balance`.
pub fn continuity(previous: f64, a: f64, b: f64) -> Option<(Direction, f64, f64)> {
    let mut found: Vec<(Direction, f64, f64)> = Vec::new();

    for (amount, balance) in [(a, b), (b, a)] {
        for direction in [Direction::Deposit, Direction::Withdrawal] {
            if !approx_eq(direction.apply(previous, amount), balance) {
                continue;
            }
            let duplicate = found.iter().any(|(d, am, bal)| {
                *d == direction && approx_eq(*am, amount) && approx_eq(*bal, balance)
            });
            if !duplicate {
                found.push((direction, amount, balance));
            }
        }
    }

    match found.as_slice() {
        [only] => Some(*only),
        _ => None,
    }
}

/// Direction that takes `previous` to `balance` by `amount`, when exactly one does
pub fn direction_by_balance(previous: f64, amount: f64, balance: f64) -> Option<Direction> {
    let deposit = approx_eq(Direction::Deposit.apply(previous, amount), balance);
    let withdrawal = approx_eq(Direction::Withdrawal.apply(previous, amount), balance);
    match (deposit, withdrawal) {
        (true, false) => Some(Direction::Deposit),
        (false, true) => Some(Direction::Withdrawal),
        _ => None,
    }
}

/// Continuity restricted to one direction; returns `(amount, balance)`
pub fn continuity_for(direction: Direction, previous: f64, a: f64, b: f64) -> Option<(f64, f64)> {
    [(a, b), (b, a)]
        .into_iter()
        .find(|(amount, balance)| approx_eq(direction.apply(previous, *amount), *balance))
}

/// First token pair, in printed order, where the earlier token is the amount
/// and the later one the balance reached from `previous`.
///
/// With `direction` set only that direction is tried. Returns the direction
/// and the indices of the amount and balance tokens.
pub fn continuity_among(
    previous: f64,
    tokens: &[f64],
    direction: Option<Direction>,
) -> Option<(Direction, usize, usize)> {
    let directions: &[Direction] = match direction {
        Some(Direction::Deposit) => &[Direction::Deposit],
        Some(Direction::Withdrawal) => &[Direction::Withdrawal],
        None => &[Direction::Deposit, Direction::Withdrawal],
    };
    for (i, amount) in tokens.iter().enumerate() {
        if *amount <= 0.0 {
            continue;
        }
        for (j, balance) in tokens.iter().enumerate().skip(i + 1) {
            if let Some(d) = directions
                .iter()
                .find(|d| approx_eq(d.apply(previous, *amount), *balance))
            {
                return Some((*d, i, j));
            }
        }
    }
    None
}

/// Keyword table for two-token blocks the balance check cannot settle
#[derive(Debug, Clone, Copy)]
pub struct TwoTokenRules {
    pub deposit_keywords: &'static [&'static str],
    pub withdrawal_keywords: &'static [&'static str],
    /// Direction when no keyword matches; `None` leaves the entry informational
    pub default: Option<Direction>,
    /// Compare with all spaces removed (OCR splits words unpredictably)
    pub ignore_spaces: bool,
}

impl TwoTokenRules {
    /// Withdrawal keywords are checked first
    pub fn keyword_direction(&self, description_upper: &str) -> Option<Direction> {
        let haystack = if self.ignore_spaces {
            description_upper.replace(' ', "")
        } else {
            description_upper.to_string()
        };
        let hit = |keywords: &[&str]| {
            keywords.iter().any(|k| {
                if self.ignore_spaces {
                    haystack.contains(&k.replace(' ', ""))
                } else {
                    haystack.contains(k)
                }
            })
        };

        if hit(self.withdrawal_keywords) {
            Some(Direction::Withdrawal)
        } else if hit(self.deposit_keywords) {
            Some(Direction::Deposit)
        } else {
            None
        }
    }
}

/// Column layout for blocks with three or more tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManyTokenPolicy {
    /// First three tokens are deposit, withdrawal, balance
    DepositWithdrawalBalance,
    /// Second-to-last is the amount, last is the balance
    LastTwo,
}

/// Which tier settled a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionRule {
    BalanceOnly,
    Continuity,
    Keyword,
    Positional,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    /// `None` for balance-only and informational entries
    pub direction: Option<Direction>,
    pub amount: f64,
    pub balance: Option<f64>,
    pub rule: ResolutionRule,
}

impl Resolution {
    /// `(deposit, withdrawal)`
    pub fn columns(&self) -> (f64, f64) {
        match self.direction {
            Some(direction) => direction.split(self.amount),
            None => (0.0, 0.0),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Resolver {
    rules: TwoTokenRules,
    many: ManyTokenPolicy,
}

impl Resolver {
    pub const fn new(rules: TwoTokenRules, many: ManyTokenPolicy) -> Self {
        Self { rules, many }
    }

    pub fn rules(&self) -> &TwoTokenRules {
        &self.rules
    }

    /// Resolve a block's tokens. `None` when the block carries no amount at all.
    pub fn resolve(
        &self,
        amounts: &[f64],
        previous_balance: Option<f64>,
        description_upper: &str,
    ) -> Option<Resolution> {
        match amounts {
            [] => None,
            [balance] => Some(Resolution {
                direction: None,
                amount: 0.0,
                balance: Some(*balance),
                rule: ResolutionRule::BalanceOnly,
            }),
            [a, b] => Some(self.resolve_pair(*a, *b, previous_balance, description_upper)),
            _ => Some(self.resolve_many(amounts, previous_balance, description_upper)),
        }
    }

    /// Amount and balance with the direction still open
    pub fn resolve_pair(
        &self,
        a: f64,
        b: f64,
        previous_balance: Option<f64>,
        description_upper: &str,
    ) -> Resolution {
        if let Some((direction, amount, balance)) =
            previous_balance.and_then(|prev| continuity(prev, a, b))
        {
            return Resolution {
                direction: Some(direction),
                amount,
                balance: Some(balance),
                rule: ResolutionRule::Continuity,
            };
        }

        if let Some(direction) = self.rules.keyword_direction(description_upper) {
            return Resolution {
                direction: Some(direction),
                amount: a,
                balance: Some(b),
                rule: ResolutionRule::Keyword,
            };
        }

        let (amount, balance) = if a <= b { (a, b) } else { (b, a) };
        Resolution {
            direction: self.rules.default,
            amount,
            balance: Some(balance),
            rule: ResolutionRule::Fallback,
        }
    }

    fn resolve_many(
        &self,
        amounts: &[f64],
        previous_balance: Option<f64>,
        description_upper: &str,
    ) -> Resolution {
        match self.many {
            ManyTokenPolicy::DepositWithdrawalBalance => {
                let (deposit, withdrawal, balance) = (amounts[0], amounts[1], amounts[2]);
                let (direction, amount) = if deposit > 0.0 {
                    (Some(Direction::Deposit), deposit)
                } else if withdrawal > 0.0 {
                    (Some(Direction::Withdrawal), withdrawal)
                } else {
                    (None, 0.0)
                };
                Resolution {
                    direction,
                    amount,
                    balance: Some(balance),
                    rule: ResolutionRule::Positional,
                }
            }
            ManyTokenPolicy::LastTwo => {
                let n = amounts.len();
                let (amount, balance) = (amounts[n - 2], amounts[n - 1]);
                let direction = previous_balance
                    .and_then(|prev| direction_by_balance(prev, amount, balance))
                    .or_else(|| self.rules.keyword_direction(description_upper))
                    .or(self.rules.default);
                Resolution {
                    direction,
                    amount,
                    balance: Some(balance),
                    rule: ResolutionRule::Positional,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: TwoTokenRules = TwoTokenRules {
        deposit_keywords: &["DEPOSITO", "ABONO", "PAGO RECIBIDO"],
        withdrawal_keywords: &[],
        default: Some(Direction::Withdrawal),
        ignore_spaces: false,
    };

    #[test]
    fn test_spei_deposit_by_continuity() {
        let resolver = Resolver::new(RULES, ManyTokenPolicy::LastTwo);
        let r = resolver
            .resolve(&[1_000.0, 5_000.0], Some(4_000.0), "DEPOSITO SPEI RECIBIDO")
            .unwrap();
        assert_eq!(r.direction, Some(Direction::Deposit));
        assert_eq!(r.amount, 1_000.0);
        assert_eq!(r.balance, Some(5_000.0));
        assert_eq!(r.rule, ResolutionRule::Continuity);
        assert_eq!(r.columns(), (1_000.0, 0.0));
    }

    #[test]
    fn test_continuity_property() {
        // Synthetic pairs: whatever the printed order, the unique candidate is found
        let cases = [
            (10_000.0, 250.0, Direction::Withdrawal),
            (10_000.0, 1_234.56, Direction::Deposit),
            (0.0, 99.99, Direction::Deposit),
        ];
        for (prev, amount, direction) in cases {
            let balance = direction.apply(prev, amount);
            assert_eq!(continuity(prev, amount, balance), Some((direction, amount, balance)));
            assert_eq!(continuity(prev, balance, amount), Some((direction, amount, balance)));
        }
    }

    #[test]
    fn test_continuity_edge_cases() {
        assert_eq!(continuity(100.0, 50.0, 50.0), Some((Direction::Withdrawal, 50.0, 50.0)));
        assert_eq!(continuity(0.0, 5.0, 5.0), Some((Direction::Deposit, 5.0, 5.0)));
        // Zero amount fits both directions
        assert_eq!(continuity(100.0, 0.0, 100.0), None);
        assert_eq!(continuity(100.0, 7.0, 300.0), None);
    }

    #[test]
    fn test_keyword_then_fallback() {
        let resolver = Resolver::new(RULES, ManyTokenPolicy::LastTwo);
        let keyword = resolver.resolve(&[300.0, 800.0], None, "ABONO NOMINA").unwrap();
        assert_eq!(keyword.rule, ResolutionRule::Keyword);
        assert_eq!(keyword.direction, Some(Direction::Deposit));

        let fallback = resolver.resolve(&[800.0, 300.0], None, "COMPRA TIENDA").unwrap();
        assert_eq!(fallback.rule, ResolutionRule::Fallback);
        assert_eq!(fallback.direction, Some(Direction::Withdrawal));
        assert_eq!(fallback.amount, 300.0);
        assert_eq!(fallback.balance, Some(800.0));
    }

    #[test]
    fn test_single_token_is_balance() {
        let resolver = Resolver::new(RULES, ManyTokenPolicy::LastTwo);
        let r = resolver.resolve(&[4_000.0], None, "SALDO ANTERIOR").unwrap();
        assert_eq!(r.rule, ResolutionRule::BalanceOnly);
        assert_eq!(r.columns(), (0.0, 0.0));
        assert!(resolver.resolve(&[], None, "").is_none());
    }

    #[test]
    fn test_many_tokens() {
        let positional = Resolver::new(RULES, ManyTokenPolicy::DepositWithdrawalBalance);
        let r = positional.resolve(&[0.0, 120.0, 880.0], None, "").unwrap();
        assert_eq!(r.direction, Some(Direction::Withdrawal));
        assert_eq!(r.amount, 120.0);

        let last_two = Resolver::new(RULES, ManyTokenPolicy::LastTwo);
        let r = last_two.resolve(&[15.0, 120.0, 1_120.0], Some(1_000.0), "").unwrap();
        assert_eq!(r.direction, Some(Direction::Deposit));
        assert_eq!(r.balance, Some(1_120.0));
    }

    #[test]
    fn test_direction_by_balance() {
        assert_eq!(direction_by_balance(100.0, 25.0, 75.0), Some(Direction::Withdrawal));
        assert_eq!(direction_by_balance(100.0, 25.0, 125.0), Some(Direction::Deposit));
        assert_eq!(direction_by_balance(100.0, 0.0, 100.0), None);
        assert_eq!(direction_by_balance(100.0, 25.0, 90.0), None);
    }

    #[test]
    fn test_continuity_among_skips_stray_tokens() {
        // Exchange rate printed after the balance
        assert_eq!(
            continuity_among(8_000.0, &[1_000.0, 7_000.0, 17.25], None),
            Some((Direction::Withdrawal, 0, 1))
        );
        // Foreign amount printed before the peso amount
        assert_eq!(
            continuity_among(15_000.0, &[50.0, 1_000.0, 14_000.0], None),
            Some((Direction::Withdrawal, 1, 2))
        );
        assert_eq!(
            continuity_among(8_000.0, &[1_000.0, 7_000.0], Some(Direction::Deposit)),
            None
        );
        assert_eq!(continuity_among(100.0, &[0.0, 100.0, 3.0], None), None);
    }

    #[test]
    fn test_keywords_ignoring_spaces() {
        let rules = TwoTokenRules {
            deposit_keywords: &[],
            withdrawal_keywords: &["ENVIO SPEI"],
            default: Some(Direction::Deposit),
            ignore_spaces: true,
        };
        assert_eq!(rules.keyword_direction("EN VIO SP EI A BANORTE"), Some(Direction::Withdrawal));
        assert_eq!(rules.keyword_direction("DEPOSITO SPEI"), None);
    }
}
