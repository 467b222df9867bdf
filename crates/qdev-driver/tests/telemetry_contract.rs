//! `telemetry_contract` 集成测试：全局订阅者只能安装一次。
//!
//! 独立成一个测试二进制，避免与使用 `#[traced_test]` 的单元测试争抢全局订阅者。

use std::thread;

use qdev_driver::{
    DriverError,
    telemetry::{install_logging, is_installed},
};

/// 并发安装时恰好一个调用成功，其余得到 `LoggingAlreadyInstalled`，之后状态保持已安装。
#[test]
fn concurrent_installs_have_exactly_one_winner() {
    let outcomes: Vec<_> = (0..4)
        .map(|_| thread::spawn(|| install_logging("qdev_driver=debug,qdev_store=debug")))
        .collect::<Vec<_>>()
        .into_iter()
        .map(|worker| worker.join().expect("安装线程不应 panic"))
        .collect();

    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    for outcome in outcomes.iter().filter(|outcome| outcome.is_err()) {
        assert_eq!(outcome, &Err(DriverError::LoggingAlreadyInstalled));
    }
    assert!(is_installed());
    assert_eq!(
        install_logging("info"),
        Err(DriverError::LoggingAlreadyInstalled)
    );
}
