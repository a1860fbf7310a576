//! Bank and account-layout recognition from first-page text

use crate::models::{BankTag, BankVariant};

/// Anchor phrases, most specific first. First match wins.
const BANK_ANCHORS: &[(&str, BankTag)] = &[
    ("MAESTRA PYME BBVA", BankTag::Bbva),
    ("BANCO DEL BAJIO S.A.", BankTag::BanBajio),
    ("RESUMEN POR MEDIOS DE ACCESO", BankTag::Banamex),
    ("ESTADO DE CUENTA / CUENTA PREFERENTE", BankTag::Banorte),
    ("SCOTIABANK INVERLAT", BankTag::Scotiabank),
    ("DINERO CRECIENTE SANTANDER", BankTag::Santander),
    ("BANCO SANTANDER", BankTag::Santander),
    ("BBVA MEXICO", BankTag::Bbva),
    ("BANORTE", BankTag::Banorte),
    ("SCOTIABANK", BankTag::Scotiabank),
];

const BANAMEX_LAYOUTS: &[(&str, BankVariant)] = &[
    ("CUENTA DE CHEQUES MONEDA NACIONAL", BankVariant::BanamexEmpresarial),
    ("MICUENTA", BankVariant::BanamexPersonal),
];

const SCOTIABANK_PRODUCTS: &[&str] = &["PYME", "PFAE"];

pub fn identify_bank(first_page_text: &str) -> Option<BankTag> {
    let upper = first_page_text.to_uppercase();
    BANK_ANCHORS
        .iter()
        .find(|(anchor, _)| upper.contains(anchor))
        .map(|(_, bank)| *bank)
}

/// Layout within an identified bank; `None` when the bank's layout is unknown
pub fn identify_account_variant(bank: BankTag, first_page_text: &str) -> Option<BankVariant> {
    let upper = first_page_text.to_uppercase();
    match bank {
        BankTag::Banamex => BANAMEX_LAYOUTS
            .iter()
            .find(|(phrase, _)| upper.contains(phrase))
            .map(|(_, variant)| *variant),
        BankTag::Scotiabank => SCOTIABANK_PRODUCTS
            .iter()
            .any(|p| upper.contains(p))
            .then_some(BankVariant::ScotiabankPyme),
        BankTag::BanBajio => Some(BankVariant::BanBajioEmpresarial),
        BankTag::Bbva => Some(BankVariant::Bbva),
        BankTag::Banorte => Some(BankVariant::Banorte),
        BankTag::Santander => Some(BankVariant::Santander),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_anchors() {
        for (anchor, bank) in BANK_ANCHORS {
            let page = format!("Estado de cuenta\n{}\nCliente: EMPRESA SA DE CV", anchor.to_lowercase());
            assert_eq!(identify_bank(&page), Some(*bank), "anchor {}", anchor);
        }
    }

    #[test]
    fn test_specific_anchor_wins() {
        // A Banorte statement mentioning a BBVA transfer
        let page = "ESTADO DE CUENTA / CUENTA PREFERENTE\nSPEI A BBVA MEXICO";
        assert_eq!(identify_bank(page), Some(BankTag::Banorte));
    }

    #[test]
    fn test_no_anchor() {
        assert_eq!(identify_bank(""), None);
        assert_eq!(identify_bank("HSBC MEXICO S.A."), None);
    }

    #[test]
    fn test_banamex_layouts() {
        assert_eq!(
            identify_account_variant(BankTag::Banamex, "Cuenta de Cheques Moneda Nacional 7001"),
            Some(BankVariant::BanamexEmpresarial)
        );
        assert_eq!(
            identify_account_variant(BankTag::Banamex, "MiCuenta 123456"),
            Some(BankVariant::BanamexPersonal)
        );
        assert_eq!(identify_account_variant(BankTag::Banamex, "Cuenta Perfiles"), None);
    }

    #[test]
    fn test_scotiabank_requires_product() {
        assert_eq!(
            identify_account_variant(BankTag::Scotiabank, "Cuenta Unica PyME"),
            Some(BankVariant::ScotiabankPyme)
        );
        assert_eq!(
            identify_account_variant(BankTag::Scotiabank, "Cuenta PFAE"),
            Some(BankVariant::ScotiabankPyme)
        );
        assert_eq!(identify_account_variant(BankTag::Scotiabank, "Cuenta Nómina"), None);
    }

    #[test]
    fn test_single_layout_banks() {
        assert_eq!(identify_account_variant(BankTag::Bbva, ""), Some(BankVariant::Bbva));
        assert_eq!(identify_account_variant(BankTag::Santander, ""), Some(BankVariant::Santander));
    }
}
