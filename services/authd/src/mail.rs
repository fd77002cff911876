//! 换绑验证码投递：邮箱推导、脱敏与投递通道。

use std::fmt;

use tracing::info;

/// 一封换绑验证码邮件；`Debug` 输出不含验证码与完整邮箱。
#[derive(Clone)]
pub(crate) struct RebindMail {
    pub(crate) to: String,
    pub(crate) masked_to: String,
    pub(crate) code: String,
    pub(crate) old_device_code: String,
    pub(crate) new_device_code: String,
    pub(crate) client_ip: String,
    pub(crate) system_name: String,
}

impl fmt::Debug for RebindMail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RebindMail")
            .field("to", &self.masked_to)
            .field("code", &"******")
            .field("old_device_code", &self.old_device_code)
            .field("new_device_code", &self.new_device_code)
            .field("client_ip", &self.client_ip)
            .field("system_name", &self.system_name)
            .finish()
    }
}

impl RebindMail {
    pub(crate) fn subject(&self) -> String {
        format!("【{}】设备码换绑验证码", self.system_name)
    }

    /// 纯文本正文，包含验证码。
    pub(crate) fn body(&self) -> String {
        format!(
            "您正在申请设备码换绑。\n\n验证码：{code}\n旧设备码：{old}\n新设备码：{new}\n请求 IP：{ip}\n\n验证码 10 分钟内有效，请勿泄露给他人。如非本人操作请忽略本邮件。",
            code = self.code,
            old = self.old_device_code,
            new = self.new_device_code,
            ip = self.client_ip,
        )
    }

    /// 收件域名（日志用）。
    fn recipient_domain(&self) -> &str {
        self.to.split_once('@').map_or("", |(_, domain)| domain)
    }
}

/// 邮件投递通道。
pub(crate) trait Mailer: Send + Sync {
    fn send_rebind_code(&self, mail: &RebindMail) -> Result<(), String>;
}

/// 仅写日志的模拟投递（未配置 SMTP 时的行为）。
#[derive(Debug, Default)]
pub(crate) struct LogMailer;

impl Mailer for LogMailer {
    fn send_rebind_code(&self, mail: &RebindMail) -> Result<(), String> {
        info!(
            to = %mail.masked_to,
            domain = mail.recipient_domain(),
            subject = %mail.subject(),
            body_chars = mail.body().chars().count(),
            old_device = %mail.old_device_code,
            new_device = %mail.new_device_code,
            client_ip = %mail.client_ip,
            "simulated rebind code delivery"
        );
        Ok(())
    }
}

/// QQ 号对应的邮箱。
pub(crate) fn email_for_qq(qq_number: &str) -> String {
    format!("{}@qq.com", qq_number.trim())
}

/// 脱敏邮箱：用户名 ≤3 位保留首字符，否则保留前 2 位与末位。
pub(crate) fn mask_email(email: &str) -> String {
    let (user, domain) = email.split_once('@').unwrap_or((email, ""));
    let chars = user.chars().collect::<Vec<_>>();
    let Some(first) = chars.first() else {
        return format!("***@{domain}");
    };
    if chars.len() <= 3 {
        return format!("{first}***@{domain}");
    }
    let head = chars[..2].iter().collect::<String>();
    let tail = chars[chars.len() - 1];
    format!("{head}***{tail}@{domain}")
}

#[cfg(test)]
mod tests {
    use super::{RebindMail, email_for_qq, mask_email};

    #[test]
    fn qq_email_is_derived_from_number() {
        assert_eq!(email_for_qq(" 123456 "), "123456@qq.com");
    }

    #[test]
    fn mask_keeps_head_and_tail() {
        assert_eq!(mask_email("123456789@qq.com"), "12***9@qq.com");
        assert_eq!(mask_email("abcd@example.com"), "ab***d@example.com");
    }

    #[test]
    fn short_user_names_keep_first_char_only() {
        assert_eq!(mask_email("abc@qq.com"), "a***@qq.com");
        assert_eq!(mask_email("a@qq.com"), "a***@qq.com");
        assert_eq!(mask_email("@qq.com"), "***@qq.com");
    }

    #[test]
    fn debug_output_hides_code_and_address() {
        let mail = RebindMail {
            to: "123456789@qq.com".to_string(),
            masked_to: "12***9@qq.com".to_string(),
            code: "482913".to_string(),
            old_device_code: "OLD".to_string(),
            new_device_code: "NEW".to_string(),
            client_ip: "127.0.0.1".to_string(),
            system_name: "test".to_string(),
        };
        let rendered = format!("{mail:?}");
        assert!(!rendered.contains("482913"));
        assert!(!rendered.contains("123456789@qq.com"));
        assert!(rendered.contains("12***9@qq.com"));

        assert!(mail.body().contains("482913"));
        assert_eq!(mail.subject(), "【test】设备码换绑验证码");
        assert_eq!(mail.recipient_domain(), "qq.com");
    }
}
