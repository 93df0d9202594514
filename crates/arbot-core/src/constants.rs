//! Engine constants. All monetary values in cents (1 USDT = 100 cents).

/// Cents per whole stablecoin unit.
pub const UNIT: u64 = 100;

/// Length of one profit cycle in seconds (2 hours).
pub const CYCLE_SECS: u64 = 7_200;

/// Seconds per day.
pub const SECS_PER_DAY: u64 = 86_400;

/// Profit cycles per day.
pub const CYCLES_PER_DAY: u64 = SECS_PER_DAY / CYCLE_SECS;

/// Referral share of each cycle's profit, in basis points (20%).
pub const REFERRAL_RATE_BPS: u64 = 2_000;

/// Basis-point precision.
pub const BPS_PRECISION: u64 = 10_000;

/// Fixed tier anchors for the profit curve: `(balance, daily_profit)`,
/// both in cents, strictly ascending in balance.
///
/// The daily-profit/balance ratio rises from 15% at the first anchor to
/// 32% at the last, so the curve is monotone both between anchors and at
/// the extrapolated ends.
pub const PROFIT_TIERS: [(u64, u64); 7] = [
    (20 * UNIT, 300),        // 20.00    -> 3.00 / day
    (99 * UNIT, 1_683),      // 99.00    -> 16.83
    (458 * UNIT, 9_160),     // 458.00   -> 91.60
    (1_288 * UNIT, 28_336),  // 1288.00  -> 283.36
    (4_388 * UNIT, 109_700), // 4388.00  -> 1097.00
    (10_888 * UNIT, 304_864), // 10888.00 -> 3048.64
    (25_888 * UNIT, 828_416), // 25888.00 -> 8284.16
];
