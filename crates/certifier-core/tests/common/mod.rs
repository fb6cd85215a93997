//! Shared fixtures: one set of keys per test world, evidence packages for
//! every format, and the policy statements each format needs.

#![allow(dead_code)]

use certifier_core::{
    AttestationReport, Certifier, Clause, EvidenceFormat, EvidenceItem, EvidencePackage, KeyPair,
    Measurement, PolicyIndex, ReportPlatform, SignedStatement, Verb,
};

pub struct World {
    pub admin: KeyPair,
    pub platform: KeyPair,
    pub attest: KeyPair,
    pub ark: KeyPair,
    pub ask: KeyPair,
    pub vcek: KeyPair,
    pub enclave: KeyPair,
    pub measurement: Measurement,
}

impl World {
    pub fn new() -> Self {
        Self {
            admin: KeyPair::generate("policy-key"),
            platform: KeyPair::generate("platform-key"),
            attest: KeyPair::generate("attest-key"),
            ark: KeyPair::generate("ark"),
            ask: KeyPair::generate("ask"),
            vcek: KeyPair::generate("vcek"),
            enclave: KeyPair::generate("app-enclave"),
            measurement: Measurement::new(vec![0x5a; 48]),
        }
    }

    // =========================================================================
    // Policy
    // =========================================================================

    pub fn policy(&self, quoted: Clause) -> SignedStatement {
        self.admin
            .sign_statement(&Clause::says(self.admin.entity(), quoted))
            .expect("sign policy")
    }

    pub fn measurement_policy(&self) -> SignedStatement {
        self.policy(Clause::unary(self.measurement.clone(), Verb::IsTrusted))
    }

    pub fn platform_key_policy(&self, key: &KeyPair) -> SignedStatement {
        self.policy(Clause::trusted_for_attestation(key.entity()))
    }

    /// Every policy statement any format needs
    pub fn full_policy(&self) -> Vec<SignedStatement> {
        vec![
            self.measurement_policy(),
            self.platform_key_policy(&self.platform),
            self.platform_key_policy(&self.ark),
        ]
    }

    pub fn certifier(&self, policy: Vec<SignedStatement>) -> Certifier {
        Certifier::new(self.admin.entity(), PolicyIndex::build(policy))
    }

    // =========================================================================
    // Evidence
    // =========================================================================

    pub fn endorse(issuer: &KeyPair, subject: &KeyPair) -> SignedStatement {
        issuer
            .sign_statement(&Clause::says(
                issuer.entity(),
                Clause::trusted_for_attestation(subject.entity()),
            ))
            .expect("sign endorsement")
    }

    pub fn binding_claim(&self, attester: &KeyPair) -> SignedStatement {
        attester
            .sign_statement(&Clause::says(
                attester.entity(),
                Clause::speaks_for(self.enclave.entity(), self.measurement.clone()),
            ))
            .expect("sign binding")
    }

    pub fn report(&self, platform: ReportPlatform, attester: &KeyPair) -> EvidenceItem {
        let report = AttestationReport::new(platform, self.enclave.entity(), self.measurement.clone())
            .with_report_data(b"nonce".to_vec());
        EvidenceItem::AttestationReport(attester.sign_report(&report).expect("sign report"))
    }

    /// platform key endorses attest key, attest key binds the enclave
    pub fn platform_package(&self) -> EvidencePackage {
        EvidencePackage::vse()
            .with_item(EvidenceItem::Cert(Self::endorse(&self.platform, &self.attest)))
            .with_item(EvidenceItem::SignedClaim(self.binding_claim(&self.attest)))
    }

    /// policy key endorses attest key directly
    pub fn augmented_package(&self) -> EvidencePackage {
        EvidencePackage::vse()
            .with_item(EvidenceItem::Cert(Self::endorse(&self.admin, &self.attest)))
            .with_item(self.report(ReportPlatform::Vse, &self.attest))
    }

    /// ARK -> ASK -> VCEK chain plus a VCEK-signed report
    pub fn sev_package(&self) -> EvidencePackage {
        EvidencePackage::vse()
            .with_item(EvidenceItem::CertChain {
                certs: vec![
                    Self::endorse(&self.ark, &self.ark),
                    Self::endorse(&self.ark, &self.ask),
                    Self::endorse(&self.ask, &self.vcek),
                ],
            })
            .with_item(self.report(ReportPlatform::Sev, &self.vcek))
    }

    pub fn oe_package(&self) -> EvidencePackage {
        EvidencePackage::vse().with_item(self.report(ReportPlatform::Oe, &self.platform))
    }

    pub fn gramine_package(&self) -> EvidencePackage {
        EvidencePackage::vse().with_item(self.report(ReportPlatform::Gramine, &self.platform))
    }

    pub fn package_for(&self, format: EvidenceFormat) -> EvidencePackage {
        match format {
            EvidenceFormat::FullVseSupport | EvidenceFormat::PlatformAttestationOnly => {
                self.platform_package()
            }
            EvidenceFormat::AugmentedPlatformAttestationOnly => self.augmented_package(),
            EvidenceFormat::SevEvidence | EvidenceFormat::SevPlatformAttestationOnly => {
                self.sev_package()
            }
            EvidenceFormat::OeEvidence => self.oe_package(),
            EvidenceFormat::GramineEvidence => self.gramine_package(),
        }
    }
}
